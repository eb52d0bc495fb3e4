//! The database facade.
//!
//! [`DbManager`] owns one connection and everything that is per-connection:
//! transaction depth, the active result set, query history and soft-mode
//! settings. Every operation takes `&mut self`, so a facade is used by one
//! task at a time.
//!
//! # Example
//!
//! ```ignore
//! use pgmanager::{ConnectOptions, DbConfig, DbManager, record};
//!
//! let mut db = DbManager::connect(
//!     ConnectOptions::new("localhost", "app", "secret", "library"),
//!     DbConfig::new().default_actor("system"),
//! )
//! .await?;
//!
//! let id = db
//!     .table("author")
//!     .insert(record! { "name" => "Victor Hugo", "birthdate" => "1802-02-26" })
//!     .await?;
//!
//! let author = db.table("author").get_by_id(id).await?;
//! db.close().await?;
//! ```

mod config;
mod crud;
mod execute;
mod tx;


pub use config::DbConfig;
pub use crud::Table;

use crate::driver::Driver;
use crate::error::OrmResult;
use crate::history::{ExecutedStatement, QueryLog};
use crate::pg::{ConnectOptions, PgDriver};
use crate::record::{Params, Record};
use crate::select::SelectBuilder;
use crate::soft::SoftMode;
use crate::transaction::TransactionManager;
use crate::value::Value;
use std::collections::VecDeque;

/// Rows of the last `query`, consumed by the `fetch*` family.
#[derive(Debug, Default)]
struct ResultSet {
    rows: VecDeque<Record>,
    total: usize,
}

impl ResultSet {
    fn new(rows: Vec<Record>) -> Self {
        Self {
            total: rows.len(),
            rows: rows.into(),
        }
    }
}

pub struct DbManager<D: Driver = PgDriver> {
    driver: D,
    soft: SoftMode,
    debug: bool,
    primary_key: String,
    tx: TransactionManager,
    history: QueryLog,
    result: Option<ResultSet>,
    last_insert_id: Option<i64>,
}

impl DbManager<PgDriver> {
    /// Open a PostgreSQL connection and wrap it.
    pub async fn connect(options: ConnectOptions, config: DbConfig) -> OrmResult<Self> {
        let driver = PgDriver::connect(options).await?;
        Ok(Self::new(driver, config))
    }
}

impl<D: Driver> DbManager<D> {
    pub fn new(driver: D, config: DbConfig) -> Self {
        let mut soft = SoftMode::new(config.soft_mode, config.default_actor);
        for column in config.forbidden_columns {
            soft.forbid(column);
        }
        Self {
            driver,
            soft,
            debug: config.debug,
            primary_key: config.primary_key,
            tx: TransactionManager::new(),
            history: QueryLog::new(config.history_capacity, config.history_policy),
            result: None,
            last_insert_id: None,
        }
    }

    /// Release the connection.
    ///
    /// An open transaction is left to the server, which rolls it back when the
    /// session ends.
    pub async fn close(self) -> OrmResult<()> {
        if self.tx.in_transaction() {
            tracing::warn!(
                target: "pgmanager.tx",
                level = self.tx.depth(),
                "closing connection with an open transaction"
            );
        }
        self.driver.close().await
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn set_soft_mode(&mut self, enabled: bool) -> &mut Self {
        self.soft.set_enabled(enabled);
        self
    }

    pub fn soft_mode(&self) -> bool {
        self.soft.is_enabled()
    }

    pub fn set_default_actor(&mut self, actor: impl Into<Value>) -> &mut Self {
        self.soft.set_default_actor(actor);
        self
    }

    pub fn default_actor(&self) -> &Value {
        self.soft.default_actor()
    }

    pub fn set_debug(&mut self, enabled: bool) -> &mut Self {
        self.debug = enabled;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The SQL of the last statement sent, as written by the caller.
    pub fn last_query(&self) -> Option<&str> {
        self.history.last().map(|s| s.sql.as_str())
    }

    pub fn last_query_params(&self) -> Option<&Params> {
        self.history.last().map(|s| &s.params)
    }

    /// Recent statements, oldest first.
    pub fn history(&self) -> &QueryLog {
        &self.history
    }

    /// The last statement and its parameters, formatted for a log or console.
    pub fn debug_last_query(&self) -> String {
        match self.history.last() {
            Some(s) => format!("[SQL] {}", s.describe()),
            None => "[SQL] <none>".to_string(),
        }
    }

    /// Key returned by the last successful insert or upsert.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Start a SELECT; soft mode adds the `deleted = 'NO'` filter.
    pub fn select(&self, fields: impl Into<String>) -> SelectBuilder {
        SelectBuilder::new(fields, self.soft.is_enabled(), self.primary_key.clone())
    }

    /// Table-scoped operations on `name`.
    pub fn table(&mut self, name: impl Into<String>) -> Table<'_, D> {
        Table::new(self, name.into())
    }

    fn last_statement(&self) -> Option<&ExecutedStatement> {
        self.history.last()
    }
}
