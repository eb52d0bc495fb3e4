//! Bounded record of executed statements.

use crate::record::Params;
use crate::sql::render_params;
use std::collections::VecDeque;

/// Default number of statements kept by [`QueryLog`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// SQL longer than this is cut when emitted as a tracing event.
const MAX_TRACED_SQL: usize = 200;

/// What happens when the log is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    /// Drop the whole history and start over.
    #[default]
    Purge,
    /// Drop only the oldest entry.
    Rolling,
}

/// One statement as the caller wrote it, before placeholder compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Params,
}

impl ExecutedStatement {
    /// `"<sql>\nParams: <name=value, ...>"`, for diagnostics.
    pub fn describe(&self) -> String {
        format!("{}\nParams: {}", self.sql, render_params(&self.params))
    }
}

#[derive(Debug, Clone)]
pub struct QueryLog {
    entries: VecDeque<ExecutedStatement>,
    capacity: usize,
    policy: HistoryPolicy,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, HistoryPolicy::default())
    }
}

impl QueryLog {
    /// A capacity of zero is treated as one; the last statement is always kept.
    pub fn new(capacity: usize, policy: HistoryPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    pub fn record(&mut self, sql: &str, params: &Params) {
        if self.entries.len() >= self.capacity {
            match self.policy {
                HistoryPolicy::Purge => self.entries.clear(),
                HistoryPolicy::Rolling => {
                    self.entries.pop_front();
                }
            }
        }
        self.entries.push_back(ExecutedStatement {
            sql: sql.to_string(),
            params: params.clone(),
        });
    }

    pub fn last(&self) -> Option<&ExecutedStatement> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutedStatement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Emit the SQL about to be sent to the driver.
pub(crate) fn trace_statement(operation: &str, sql: &str, param_count: usize) {
    if !tracing::enabled!(target: "pgmanager.sql", tracing::Level::DEBUG) {
        return;
    }
    let sql = if sql.len() > MAX_TRACED_SQL {
        format!("{}...", truncate_sql_bytes(sql, MAX_TRACED_SQL))
    } else {
        sql.to_string()
    };
    tracing::debug!(target: "pgmanager.sql", operation, param_count, sql = %sql, "pgmanager sql");
}
