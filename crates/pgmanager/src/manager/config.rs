use crate::history::{DEFAULT_HISTORY_CAPACITY, HistoryPolicy};
use crate::value::Value;

/// Configuration for [`DbManager`](super::DbManager).
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Stamp audit columns and turn deletes into soft deletes.
    pub soft_mode: bool,
    /// Actor written to `created_by`/`updated_by`/`deleted_by` when none is given.
    pub default_actor: Value,
    /// Put SQL and parameters in error messages instead of an opaque text.
    pub debug: bool,
    /// Column used by id lookups, `RETURNING` and upserts.
    pub primary_key: String,
    /// Number of statements kept in the query history.
    pub history_capacity: usize,
    pub history_policy: HistoryPolicy,
    /// Columns rejected in user payloads besides the audit columns.
    pub forbidden_columns: Vec<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            soft_mode: true,
            default_actor: Value::Null,
            debug: false,
            primary_key: "id".to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_policy: HistoryPolicy::Purge,
            forbidden_columns: Vec::new(),
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn soft_mode(mut self, enabled: bool) -> Self {
        self.soft_mode = enabled;
        self
    }

    pub fn default_actor(mut self, actor: impl Into<Value>) -> Self {
        self.default_actor = actor.into();
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn history(mut self, capacity: usize, policy: HistoryPolicy) -> Self {
        self.history_capacity = capacity;
        self.history_policy = policy;
        self
    }

    pub fn forbid_column(mut self, column: impl Into<String>) -> Self {
        self.forbidden_columns.push(column.into());
        self
    }
}
