use super::{DbManager, ResultSet};
use crate::driver::Driver;
use crate::error::{OPAQUE_ERROR_MESSAGE, OrmError, OrmResult};
use crate::history::{ExecutedStatement, trace_statement};
use crate::pager::{self, Page};
use crate::record::{Params, Record};
use crate::sql::{
    compile, has_top_level_limit, starts_with_keyword, strip_order_by, strip_sql_prefix,
};
use crate::value::Value;
use serde::de::DeserializeOwned;

impl<D: Driver> DbManager<D> {
    /// Turn a driver error into the facade's `Execution` error.
    ///
    /// Validation errors pass through untouched.
    pub(crate) fn wrap_error(&self, operation: &str, err: OrmError, with_statement: bool) -> OrmError {
        if err.is_validation() {
            return err;
        }
        let statement = if with_statement {
            self.last_statement().map(ExecutedStatement::describe)
        } else {
            None
        };
        let message = if self.debug {
            match &statement {
                Some(s) => format!("{operation} failed: {err}\n[SQL] {s}"),
                None => format!("{operation} failed: {err}"),
            }
        } else {
            tracing::error!(
                target: "pgmanager.sql",
                operation,
                error = %err,
                statement = statement.as_deref().unwrap_or("-"),
                "database error"
            );
            OPAQUE_ERROR_MESSAGE.to_string()
        };
        OrmError::Execution {
            message,
            source: Box::new(err),
        }
    }

    pub(crate) async fn run_query(
        &mut self,
        operation: &'static str,
        sql: &str,
        params: &Params,
    ) -> OrmResult<Vec<Record>> {
        let compiled = compile(sql, params)?;
        self.history.record(sql, params);
        trace_statement(operation, &compiled.sql, compiled.values.len());
        match self.driver.query(&compiled.sql, &compiled.values).await {
            Ok(rows) => Ok(rows),
            Err(e) => Err(self.wrap_error(operation, e, true)),
        }
    }

    pub(crate) async fn run_execute(
        &mut self,
        operation: &'static str,
        sql: &str,
        params: &Params,
    ) -> OrmResult<u64> {
        let compiled = compile(sql, params)?;
        self.history.record(sql, params);
        trace_statement(operation, &compiled.sql, compiled.values.len());
        match self.driver.execute(&compiled.sql, &compiled.values).await {
            Ok(n) => Ok(n),
            Err(e) => Err(self.wrap_error(operation, e, true)),
        }
    }

    pub(crate) async fn run_batch(&mut self, operation: &'static str, sql: &str) -> OrmResult<()> {
        self.history.record(sql, &Params::new());
        trace_statement(operation, sql, 0);
        match self.driver.batch_execute(sql).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.wrap_error(operation, e, true)),
        }
    }

    /// Run a query and make its rows the active result for the `fetch*` family.
    ///
    /// ```ignore
    /// let name = db
    ///     .query("SELECT name FROM author WHERE id = :id", &params! { "id" => "7" })
    ///     .await?
    ///     .fetch_one();
    /// ```
    pub async fn query(&mut self, sql: &str, params: &Params) -> OrmResult<&mut Self> {
        let rows = self.run_query("query", sql, params).await?;
        self.result = Some(ResultSet::new(rows));
        Ok(self)
    }

    /// Run a query and return its rows without touching the active result.
    pub async fn query_rows(&mut self, sql: &str, params: &Params) -> OrmResult<Vec<Record>> {
        self.run_query("query", sql, params).await
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: &Params) -> OrmResult<u64> {
        self.run_execute("execute", sql, params).await
    }

    /// Run one or more parameterless statements, e.g. DDL.
    pub async fn exec_raw(&mut self, sql: &str) -> OrmResult<()> {
        self.run_batch("exec_raw", sql).await
    }

    /// Next row of the active result.
    pub fn fetch(&mut self) -> Option<Record> {
        self.result.as_mut()?.rows.pop_front()
    }

    /// Remaining rows of the active result; `None` when there is none.
    pub fn fetch_all(&mut self) -> Option<Vec<Record>> {
        let result = self.result.as_mut()?;
        Some(result.rows.drain(..).collect())
    }

    /// First column of the next row.
    pub fn fetch_one(&mut self) -> Option<Value> {
        let row = self.fetch()?;
        row.into_iter().next().map(|(_, v)| v)
    }

    /// First column of every remaining row.
    pub fn fetch_all_one(&mut self) -> Option<Vec<Value>> {
        let rows = self.fetch_all()?;
        Some(
            rows.into_iter()
                .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
                .collect(),
        )
    }

    /// Next row deserialized into `T`.
    pub fn fetch_object<T: DeserializeOwned>(&mut self) -> OrmResult<Option<T>> {
        self.fetch().map(|row| row.deserialize()).transpose()
    }

    /// Remaining rows deserialized into `T`.
    pub fn fetch_object_all<T: DeserializeOwned>(&mut self) -> OrmResult<Option<Vec<T>>> {
        match self.fetch_all() {
            Some(rows) => rows
                .iter()
                .map(Record::deserialize)
                .collect::<OrmResult<Vec<T>>>()
                .map(Some),
            None => Ok(None),
        }
    }

    /// Rows in the active result, fetched or not.
    pub fn row_count(&self) -> Option<usize> {
        self.result.as_ref().map(|r| r.total)
    }

    /// Paginate an arbitrary SELECT.
    ///
    /// The total comes from `SELECT COUNT(*)` over the query with its trailing
    /// `ORDER BY` removed; the page itself appends `LIMIT`/`OFFSET`, so the
    /// query must not bound its own rows.
    pub async fn paginate(
        &mut self,
        sql: &str,
        params: &Params,
        page: u64,
        per_page: u64,
    ) -> OrmResult<Page> {
        if per_page == 0 || per_page > pager::MAX_PER_PAGE {
            return Err(OrmError::validation(format!(
                "per_page must be between 1 and {}",
                pager::MAX_PER_PAGE
            )));
        }
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let head = strip_sql_prefix(sql);
        if !["SELECT", "WITH", "VALUES", "TABLE"]
            .iter()
            .any(|k| starts_with_keyword(head, k))
        {
            return Err(OrmError::validation("paginate expects a SELECT statement"));
        }
        if has_top_level_limit(sql) {
            return Err(OrmError::validation(
                "paginate adds its own LIMIT/OFFSET; remove them from the query",
            ));
        }

        let count_sql = format!("SELECT COUNT(*) FROM ({}) AS pgm_count", strip_order_by(sql));
        let rows = self.run_query("paginate", &count_sql, params).await?;
        let total = rows
            .first()
            .and_then(|r| r.get_index(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| OrmError::decode("count", "COUNT(*) returned no integer"))?;
        let total = u64::try_from(total).unwrap_or(0);

        let layout = pager::layout(total, per_page, page);
        let data_sql = format!("{sql} LIMIT {per_page} OFFSET {}", layout.offset);
        let data = self.run_query("paginate", &data_sql, params).await?;

        Ok(Page::new(total, per_page, layout, data))
    }
}
