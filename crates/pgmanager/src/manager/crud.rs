//! Table-scoped writes and lookups with soft-mode rewriting.

use super::DbManager;
use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::filter::{Where, and_all};
use crate::ident::{Ident, quote};
use crate::record::{Params, Record};
use crate::select::SelectBuilder;
use crate::soft::{self, AUDIT_COLUMNS, WriteOrigin};
use crate::value::Value;

/// Operations on one table, obtained from [`DbManager::table`].
///
/// Settings made with [`actor`](Self::actor), [`limit`](Self::limit),
/// [`fields`](Self::fields) and [`order_by`](Self::order_by) apply to every
/// operation run through this handle.
#[must_use]
pub struct Table<'a, D: Driver> {
    db: &'a mut DbManager<D>,
    name: String,
    actor: Option<Value>,
    limit: Option<u64>,
    fields: String,
    order_by: Option<String>,
    conflict: Option<Vec<String>>,
}

/// Placeholder names for generated SQL.
///
/// A column's own name is used when it is a valid placeholder and still free,
/// which keeps debug output readable.
struct Binder {
    params: Params,
    counter: usize,
}

impl Binder {
    fn new() -> Self {
        Self {
            params: Params::new(),
            counter: 0,
        }
    }

    fn bind(&mut self, hint: &str, value: Value) -> String {
        let usable = !hint.is_empty()
            && hint.bytes().all(|b| b == b'_' || b.is_ascii_alphanumeric())
            && !hint.as_bytes()[0].is_ascii_digit();
        let mut name = if usable { hint.to_string() } else { format!("p{}", self.counter) };
        while self.params.contains_key(&name) || self.params.contains_key(&format!(":{name}")) {
            self.counter += 1;
            name = format!("{hint}_{}", self.counter);
            if !usable {
                name = format!("p{}", self.counter);
            }
        }
        self.params.insert(name.clone(), value);
        format!(":{name}")
    }

    fn into_params(self) -> Params {
        self.params
    }
}

struct Column {
    sql: String,
    hint: String,
}

fn column(name: &str) -> OrmResult<Column> {
    let ident = Ident::parse(name)?;
    Ok(Column {
        hint: ident.base_name().to_string(),
        sql: ident.to_sql(),
    })
}

fn is_audit_column(name: &str) -> bool {
    AUDIT_COLUMNS
        .iter()
        .any(|c| name.trim_matches('"').eq_ignore_ascii_case(c))
}

impl<'a, D: Driver> Table<'a, D> {
    pub(crate) fn new(db: &'a mut DbManager<D>, name: String) -> Self {
        Self {
            db,
            name,
            actor: None,
            limit: None,
            fields: "*".to_string(),
            order_by: None,
            conflict: None,
        }
    }

    /// Actor written to the audit columns instead of the default one.
    pub fn actor(mut self, actor: impl Into<Value>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Cap the number of rows an update, delete or `find_all` touches.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Select list for lookups, `*` by default.
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        let fields = fields.into();
        self.fields = if fields.trim().is_empty() {
            "*".to_string()
        } else {
            fields
        };
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        let order_by = order_by.into();
        self.order_by = (!order_by.trim().is_empty()).then_some(order_by);
        self
    }

    /// Conflict target for [`upsert`](Self::upsert); the primary key by default.
    pub fn conflict_on(mut self, columns: &[&str]) -> Self {
        self.conflict = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Start a SELECT on this table.
    pub fn select(self, fields: impl Into<String>) -> SelectBuilder {
        let table = self.name.clone();
        self.db.select(fields).from(table)
    }

    fn table_sql(&self) -> OrmResult<String> {
        quote(&self.name)
    }

    fn pk_sql(&self) -> OrmResult<String> {
        quote(&self.db.primary_key)
    }

    /// Predicates for `where_`, the soft filter first.
    fn predicates(&self, where_: &Where, binder: &mut Binder) -> OrmResult<Vec<String>> {
        let mut predicates = Vec::with_capacity(2);
        if let Some(live) = self.db.soft.live_predicate() {
            predicates.push(live.to_string());
        }
        if let Some(p) = where_.predicate(&self.pk_sql()?) {
            predicates.push(p);
        }
        if let Some(params) = where_.params() {
            for (k, v) in params.iter() {
                binder.params.insert(k, v.clone());
            }
        }
        Ok(predicates)
    }

    /// `WHERE ...` for an UPDATE/DELETE, emulating LIMIT through `ctid`.
    fn write_filter(&self, table: &str, predicates: &[String]) -> String {
        let condition = and_all(predicates);
        match (self.limit, condition) {
            (Some(n), Some(c)) => {
                format!(" WHERE ctid IN (SELECT ctid FROM {table} WHERE {c} LIMIT {n})")
            }
            (Some(n), None) => format!(" WHERE ctid IN (SELECT ctid FROM {table} LIMIT {n})"),
            (None, Some(c)) => format!(" WHERE {c}"),
            (None, None) => String::new(),
        }
    }

    fn read_filter(predicates: &[String]) -> String {
        and_all(predicates).map_or_else(String::new, |c| format!(" WHERE {c}"))
    }

    /// First column of the first row as an integer.
    fn first_integer(rows: &[Record], what: &str) -> OrmResult<i64> {
        rows.first()
            .and_then(|r| r.get_index(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| OrmError::decode(what, "expected an integer in the first column"))
    }

    /// `(cols) VALUES (...)` for one row.
    fn values_clause(row: Record, binder: &mut Binder) -> OrmResult<(Vec<String>, Vec<String>)> {
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        for (name, value) in row {
            let col = column(&name)?;
            placeholders.push(binder.bind(&col.hint, value));
            columns.push(col.sql);
        }
        Ok((columns, placeholders))
    }

    /// Insert one row and return its primary key.
    ///
    /// In soft mode the row may not name audit columns; `created_at` and
    /// `created_by` are filled in.
    pub async fn insert(&mut self, row: Record) -> OrmResult<i64> {
        let row = self
            .db
            .soft
            .rewrite_insert(row, self.actor.as_ref(), soft::now())?;
        let table = self.table_sql()?;
        let pk = self.pk_sql()?;

        let mut binder = Binder::new();
        let sql = if row.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING {pk}")
        } else {
            let (columns, placeholders) = Self::values_clause(row, &mut binder)?;
            format!(
                "INSERT INTO {table} ({}) VALUES ({}) RETURNING {pk}",
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let rows = self.db.run_query("insert", &sql, &binder.into_params()).await?;
        let id = Self::first_integer(&rows, "RETURNING")?;
        self.db.last_insert_id = Some(id);
        Ok(id)
    }

    /// Insert many rows in chunks inside one transaction level.
    ///
    /// Every row must carry the same columns as the first one. Returns the
    /// number of rows inserted; a failing chunk rolls back all of them.
    pub async fn insert_bulk(&mut self, rows: Vec<Record>, chunk_size: usize) -> OrmResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if chunk_size == 0 {
            return Err(OrmError::validation("chunk_size must be greater than zero"));
        }
        let table = self.table_sql()?;
        let now = soft::now();

        let mut expected: Vec<String> = rows[0].keys().map(str::to_string).collect();
        expected.sort();

        let mut statements = Vec::with_capacity(rows.len().div_ceil(chunk_size));
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let mut binder = Binder::new();
            let mut columns = Vec::new();
            let mut tuples = Vec::with_capacity(chunk_size);
            for row in rows.by_ref().take(chunk_size) {
                let mut keys: Vec<&str> = row.keys().collect();
                keys.sort_unstable();
                if keys != expected {
                    return Err(OrmError::validation(
                        "insert_bulk rows must all have the same columns",
                    ));
                }
                let row = self.db.soft.rewrite_insert(row, self.actor.as_ref(), now)?;
                let ordered = if columns.is_empty() {
                    row
                } else {
                    reorder(row, &columns)?
                };
                let (cols, placeholders) = Self::values_clause(ordered, &mut binder)?;
                if columns.is_empty() {
                    columns = cols;
                }
                tuples.push(format!("({})", placeholders.join(", ")));
            }
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES {}",
                columns.join(", "),
                tuples.join(", ")
            );
            statements.push((sql, binder.into_params()));
        }

        self.db
            .transaction(async move |db: &mut DbManager<D>| -> OrmResult<u64> {
                let mut inserted = 0;
                for (sql, params) in &statements {
                    inserted += db.run_execute("insert_bulk", sql, params).await?;
                }
                Ok(inserted)
            })
            .await
    }

    async fn update_rows(&mut self, row: Record, where_: Where, origin: WriteOrigin) -> OrmResult<u64> {
        let row = self
            .db
            .soft
            .rewrite_update(row, self.actor.as_ref(), origin, soft::now())?;
        if row.is_empty() {
            return Err(OrmError::validation("update requires at least one column"));
        }
        let table = self.table_sql()?;

        let mut binder = Binder::new();
        let predicates = self.predicates(&where_, &mut binder)?;
        let mut assignments = Vec::with_capacity(row.len());
        for (name, value) in row {
            let col = column(&name)?;
            let placeholder = binder.bind(&format!("set_{}", col.hint), value);
            assignments.push(format!("{} = {placeholder}", col.sql));
        }

        let sql = format!(
            "UPDATE {table} SET {}{}",
            assignments.join(", "),
            self.write_filter(&table, &predicates)
        );
        let operation = match origin {
            WriteOrigin::User => "update",
            WriteOrigin::SoftDelete => "delete",
        };
        self.db.run_execute(operation, &sql, &binder.into_params()).await
    }

    /// Update the rows matching `where_` and return how many changed.
    ///
    /// In soft mode only live rows are touched and `updated_at`/`updated_by`
    /// are filled in.
    pub async fn update(&mut self, row: Record, where_: impl Into<Where>) -> OrmResult<u64> {
        self.update_rows(row, where_.into(), WriteOrigin::User).await
    }

    /// Update every (live) row.
    pub async fn update_all(&mut self, row: Record) -> OrmResult<u64> {
        self.update_rows(row, Where::Raw(String::new()), WriteOrigin::User)
            .await
    }

    /// Delete the rows matching `where_`; in soft mode they are flagged instead.
    ///
    /// An empty predicate is rejected.
    pub async fn delete(&mut self, where_: impl Into<Where>) -> OrmResult<u64> {
        let where_ = where_.into();
        if where_.is_all() {
            return Err(OrmError::validation("delete requires a WHERE predicate"));
        }
        if self.db.soft.is_enabled() {
            let payload = self
                .db
                .soft
                .soft_delete_payload(self.actor.as_ref(), soft::now());
            return self
                .update_rows(payload, where_, WriteOrigin::SoftDelete)
                .await;
        }

        let table = self.table_sql()?;
        let mut binder = Binder::new();
        let predicates = self.predicates(&where_, &mut binder)?;
        let sql = format!(
            "DELETE FROM {table}{}",
            self.write_filter(&table, &predicates)
        );
        self.db.run_execute("delete", &sql, &binder.into_params()).await
    }

    /// Insert `row`, or update the existing row on conflict. Returns the key.
    ///
    /// `update_columns` picks what a conflict overwrites; by default every
    /// column of `row` except the key. Soft mode stamps `created_*` on insert
    /// and `updated_*` on conflict.
    pub async fn upsert(&mut self, row: Record, update_columns: Option<&[&str]>) -> OrmResult<i64> {
        let row = self
            .db
            .soft
            .rewrite_insert(row, self.actor.as_ref(), soft::now())?;
        if row.is_empty() {
            return Err(OrmError::validation("upsert requires at least one column"));
        }
        let table = self.table_sql()?;
        let pk = self.pk_sql()?;
        let pk_name = Ident::parse(&self.db.primary_key)?.base_name().to_string();
        let conflict = match &self.conflict {
            Some(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| quote(c))
                .collect::<OrmResult<Vec<_>>>()?
                .join(", "),
            _ => pk.clone(),
        };

        let targets: Vec<String> = match update_columns {
            Some(cols) => cols
                .iter()
                .map(|c| {
                    if self.db.soft.is_enabled() && is_audit_column(c) {
                        Err(OrmError::validation(format!("`{c}` is forbidden")))
                    } else {
                        quote(c)
                    }
                })
                .collect::<OrmResult<_>>()?,
            None => row
                .keys()
                .filter(|k| !is_audit_column(k) && k.trim_matches('"') != pk_name)
                .map(quote)
                .collect::<OrmResult<_>>()?,
        };
        let mut binder = Binder::new();
        let mut assignments: Vec<String> = targets
            .into_iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        if self.db.soft.is_enabled() {
            let actor = self
                .db
                .soft
                .rewrite_update(Record::new(), self.actor.as_ref(), WriteOrigin::User, soft::now())?;
            for (name, value) in actor {
                let placeholder = binder.bind(&format!("set_{name}"), value);
                assignments.push(format!("{name} = {placeholder}"));
            }
        }
        if assignments.is_empty() {
            assignments.push(format!("{pk} = EXCLUDED.{pk}"));
        }

        let (columns, placeholders) = Self::values_clause(row, &mut binder)?;
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({conflict}) DO UPDATE SET {} RETURNING {pk}",
            columns.join(", "),
            placeholders.join(", "),
            assignments.join(", ")
        );
        let rows = self.db.run_query("upsert", &sql, &binder.into_params()).await?;
        let id = Self::first_integer(&rows, "RETURNING")?;
        self.db.last_insert_id = Some(id);
        Ok(id)
    }

    /// The row with primary key `id`; soft-deleted rows are not returned.
    pub async fn get_by_id(&mut self, id: i64) -> OrmResult<Option<Record>> {
        let table = self.table_sql()?;
        let mut binder = Binder::new();
        let predicates = self.predicates(&Where::ById(id), &mut binder)?;
        let sql = format!(
            "SELECT {} FROM {table}{}",
            self.fields,
            Self::read_filter(&predicates)
        );
        let rows = self.db.run_query("get_by_id", &sql, &binder.into_params()).await?;
        Ok(rows.into_iter().next())
    }

    /// Rows whose primary key is in `ids`. An empty slice sends no SQL.
    pub async fn get_by_ids(&mut self, ids: &[i64]) -> OrmResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.table_sql()?;
        let pk = self.pk_sql()?;
        let mut binder = Binder::new();
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| binder.bind("key", Value::Int(*id)))
            .collect();
        let mut predicates = self.predicates(&Where::Raw(String::new()), &mut binder)?;
        predicates.push(format!("{pk} IN ({})", placeholders.join(", ")));
        let mut sql = format!(
            "SELECT {} FROM {table}{}",
            self.fields,
            Self::read_filter(&predicates)
        );
        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        self.db.run_query("get_by_ids", &sql, &binder.into_params()).await
    }

    /// Number of (live) rows matching `where_`.
    pub async fn count(&mut self, where_: impl Into<Where>) -> OrmResult<i64> {
        let table = self.table_sql()?;
        let mut binder = Binder::new();
        let predicates = self.predicates(&where_.into(), &mut binder)?;
        let sql = format!("SELECT COUNT(*) FROM {table}{}", Self::read_filter(&predicates));
        let rows = self.db.run_query("count", &sql, &binder.into_params()).await?;
        Self::first_integer(&rows, "count")
    }

    /// First (live) row matching `where_`, honouring `order_by`.
    pub async fn find_one(&mut self, where_: impl Into<Where>) -> OrmResult<Option<Record>> {
        let (sql, params) = self.find_sql(&where_.into(), Some(1))?;
        let rows = self.db.run_query("find_one", &sql, &params).await?;
        Ok(rows.into_iter().next())
    }

    /// All (live) rows matching `where_`, honouring `order_by` and `limit`.
    pub async fn find_all(&mut self, where_: impl Into<Where>) -> OrmResult<Vec<Record>> {
        let (sql, params) = self.find_sql(&where_.into(), self.limit)?;
        self.db.run_query("find_all", &sql, &params).await
    }

    fn find_sql(&self, where_: &Where, limit: Option<u64>) -> OrmResult<(String, Params)> {
        let table = self.table_sql()?;
        let mut binder = Binder::new();
        let predicates = self.predicates(where_, &mut binder)?;
        let mut sql = format!(
            "SELECT {} FROM {table}{}",
            self.fields,
            Self::read_filter(&predicates)
        );
        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        Ok((sql, binder.into_params()))
    }

    /// Add the soft-mode columns and the `deleted` index when missing.
    pub async fn ensure_soft_columns(&mut self) -> OrmResult<()> {
        let ident = Ident::parse(&self.name)?;
        let table = ident.to_sql();
        let index = format!(
            "\"{}_deleted_idx\"",
            ident.base_name().replace('"', "\"\"")
        );
        let sql = format!(
            "ALTER TABLE {table} \
             ADD COLUMN IF NOT EXISTS deleted VARCHAR(3) NOT NULL DEFAULT 'NO' CHECK (deleted IN ('NO', 'YES')), \
             ADD COLUMN IF NOT EXISTS created_at TIMESTAMP NULL, \
             ADD COLUMN IF NOT EXISTS created_by VARCHAR(255) NULL, \
             ADD COLUMN IF NOT EXISTS updated_at TIMESTAMP NULL, \
             ADD COLUMN IF NOT EXISTS updated_by VARCHAR(255) NULL, \
             ADD COLUMN IF NOT EXISTS deleted_at TIMESTAMP NULL, \
             ADD COLUMN IF NOT EXISTS deleted_by VARCHAR(255) NULL;\n\
             CREATE INDEX IF NOT EXISTS {index} ON {table} (deleted)"
        );
        self.db.run_batch("ensure_soft_columns", &sql).await
    }
}

/// Reorder `row` to match the column order of the first row in a bulk insert.
fn reorder(mut row: Record, columns: &[String]) -> OrmResult<Record> {
    let mut ordered = Record::with_capacity(row.len());
    for col in columns {
        let key = row
            .keys()
            .find(|k| quote(k).is_ok_and(|q| &q == col))
            .map(str::to_string)
            .ok_or_else(|| OrmError::validation(format!("missing column {col} in bulk row")))?;
        let value = row.remove(&key).unwrap_or_default();
        ordered.insert(key, value);
    }
    Ok(ordered)
}
