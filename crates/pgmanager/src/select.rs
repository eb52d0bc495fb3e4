//! Fluent SELECT assembly.
//!
//! ```ignore
//! let sql = db
//!     .select("author.id, author.name, COUNT(book.id) AS books")
//!     .from("author LEFT JOIN book ON book.author_id = author.id")
//!     .where_("author.name ILIKE :pattern")
//!     .group_by("author.id")
//!     .order_by("books DESC")
//!     .limit(10)
//!     .build()?;
//! ```
//!
//! Fragments are raw SQL supplied by the application; values belong in
//! `:name` placeholders passed to [`SelectBuilder::fetch_all`] and friends.
//! Each builder is an independent value, so one chain never leaks into the next.

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::filter::{Where, and_all};
use crate::ident::quote;
use crate::manager::DbManager;
use crate::pager::Page;
use crate::record::{Params, Record};
use crate::soft::LIVE_PREDICATE;

#[derive(Debug, Clone)]
#[must_use]
pub struct SelectBuilder {
    select: String,
    from: Option<String>,
    where_conditions: Vec<Where>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    soft_filter: bool,
    primary_key: String,
}

fn non_empty(fragment: impl Into<String>) -> Option<String> {
    let s = fragment.into();
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SelectBuilder {
    /// `soft_filter` adds `deleted = 'NO'` to the WHERE list; `primary_key`
    /// is the column a bare numeric WHERE fragment refers to.
    pub fn new(fields: impl Into<String>, soft_filter: bool, primary_key: impl Into<String>) -> Self {
        Self {
            select: non_empty(fields).unwrap_or_else(|| "*".to_string()),
            from: None,
            where_conditions: Vec::new(),
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            offset: None,
            soft_filter,
            primary_key: primary_key.into(),
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = non_empty(from);
        self
    }

    /// Add a predicate; predicates are ANDed. A bare integer means `<pk> = <n>`.
    pub fn where_(mut self, predicate: impl Into<String>) -> Self {
        if let Some(p) = non_empty(predicate) {
            let condition = match p.parse::<i64>() {
                Ok(id) => Where::ById(id),
                Err(_) => Where::Raw(p),
            };
            self.where_conditions.push(condition);
        }
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = non_empty(group_by);
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = non_empty(having);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = non_empty(order_by);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Drop the soft-delete filter for this query.
    pub fn include_deleted(mut self) -> Self {
        self.soft_filter = false;
        self
    }

    /// Render the SQL, consuming the builder. Fails when no FROM was given.
    ///
    /// Clone the builder first to render the same query twice:
    ///
    /// ```compile_fail
    /// let builder = pgmanager::SelectBuilder::new("id", false, "id").from("author");
    /// let first = builder.build();
    /// let second = builder.build();
    /// ```
    pub fn build(self) -> OrmResult<String> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| OrmError::validation("FROM not initialized"))?;

        let mut predicates = Vec::with_capacity(self.where_conditions.len() + 1);
        if self.soft_filter {
            predicates.push(LIVE_PREDICATE.to_string());
        }
        if !self.where_conditions.is_empty() {
            let pk = quote(&self.primary_key)?;
            predicates.extend(self.where_conditions.iter().filter_map(|w| w.predicate(&pk)));
        }

        let mut sql = format!("SELECT {}\nFROM {}", self.select, from);
        if let Some(w) = and_all(&predicates) {
            sql.push_str("\nWHERE ");
            sql.push_str(&w);
        }
        if let Some(g) = &self.group_by {
            sql.push_str("\nGROUP BY ");
            sql.push_str(g);
        }
        if let Some(h) = &self.having {
            sql.push_str("\nHAVING ");
            sql.push_str(h);
        }
        if let Some(o) = &self.order_by {
            sql.push_str("\nORDER BY ");
            sql.push_str(o);
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!("\nLIMIT {n}"));
        }
        if let Some(n) = self.offset {
            sql.push_str(&format!("\nOFFSET {n}"));
        }
        Ok(sql)
    }

    /// Run the query and make it the active result on `db`, ready for `fetch*`.
    pub async fn execute<'d, D: Driver>(
        self,
        db: &'d mut DbManager<D>,
        params: &Params,
    ) -> OrmResult<&'d mut DbManager<D>> {
        let sql = self.build()?;
        db.query(&sql, params).await
    }

    /// Run the query and return every row.
    pub async fn fetch_all<D: Driver>(
        self,
        db: &mut DbManager<D>,
        params: &Params,
    ) -> OrmResult<Vec<Record>> {
        let sql = self.build()?;
        db.query_rows(&sql, params).await
    }

    /// Run the query paginated. Any LIMIT/OFFSET set on the builder is ignored.
    pub async fn paginate<D: Driver>(
        mut self,
        db: &mut DbManager<D>,
        params: &Params,
        page: u64,
        per_page: u64,
    ) -> OrmResult<Page> {
        self.limit = None;
        self.offset = None;
        let sql = self.build()?;
        db.paginate(&sql, params, page, per_page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SelectBuilder {
        SelectBuilder::new("*", false, "id")
    }

    #[test]
    fn missing_from_is_validation_error() {
        let err = builder().where_("a = 1").build().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn full_chain_renders_in_clause_order() {
        let sql = SelectBuilder::new("name, COUNT(*) AS n", false, "id")
            .from("book")
            .where_("year > :year")
            .group_by("name")
            .having("COUNT(*) > 1")
            .order_by("n DESC")
            .limit(10)
            .offset(20)
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT name, COUNT(*) AS n\nFROM book\nWHERE year > :year\nGROUP BY name\n\
             HAVING COUNT(*) > 1\nORDER BY n DESC\nLIMIT 10\nOFFSET 20"
        );
    }

    #[test]
    fn soft_filter_comes_first() {
        let sql = SelectBuilder::new("*", true, "id")
            .from("author")
            .where_("name = :n OR name = :m")
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT *\nFROM author\nWHERE (deleted = 'NO') AND (name = :n OR name = :m)"
        );
    }

    #[test]
    fn include_deleted_drops_soft_filter() {
        let sql = SelectBuilder::new("*", true, "id")
            .from("author")
            .include_deleted()
            .build()
            .unwrap();
        assert_eq!(sql, "SELECT *\nFROM author");
    }

    #[test]
    fn numeric_where_targets_primary_key() {
        let sql = SelectBuilder::new("*", false, "author_pk")
            .from("author")
            .where_(" 42 ")
            .build()
            .unwrap();
        assert_eq!(sql, "SELECT *\nFROM author\nWHERE author_pk = 42");
    }

    #[test]
    fn blank_fields_default_to_star() {
        let sql = SelectBuilder::new("", false, "id").from("t").build().unwrap();
        assert_eq!(sql, "SELECT *\nFROM t");
    }

    #[test]
    fn reuse_requires_an_explicit_clone() {
        let builder = builder().from("a").where_("x = 1");
        let copy = builder.clone().limit(5);
        assert_eq!(builder.build().unwrap(), "SELECT *\nFROM a\nWHERE x = 1");
        assert_eq!(copy.build().unwrap(), "SELECT *\nFROM a\nWHERE x = 1\nLIMIT 5");
    }

    #[test]
    fn builders_do_not_share_state() {
        let first = builder().from("a").where_("x = 1");
        let second = builder().from("b");
        assert_eq!(first.build().unwrap(), "SELECT *\nFROM a\nWHERE x = 1");
        assert_eq!(second.build().unwrap(), "SELECT *\nFROM b");
    }
}
