//! Nested transactions emulated with savepoints.
//!
//! A connection has one real transaction at a time. [`TransactionManager`]
//! tracks how many logical `begin`s are open and maps each level onto SQL:
//!
//! | depth before | begin            | commit (new depth n)       | rollback (new depth n)         |
//! |--------------|------------------|----------------------------|--------------------------------|
//! | 0            | `BEGIN`          | no-op                      | no-op                          |
//! | n ≥ 1        | `SAVEPOINT sp_n` | `COMMIT` if n = 0, else `RELEASE SAVEPOINT sp_n` | `ROLLBACK` if n = 0, else `ROLLBACK TO SAVEPOINT sp_n` |
//!
//! The depth counter is the single source of truth for what the server holds:
//! a failed `BEGIN`/`SAVEPOINT` leaves it untouched and a failed
//! `COMMIT`/`RELEASE` restores it.
//!
//! The scoped helpers live on the facade:
//! [`DbManager::transaction`](crate::DbManager::transaction) and
//! [`DbManager::safe_transaction`](crate::DbManager::safe_transaction).

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};

/// Savepoint name for a nesting level.
pub(crate) fn savepoint_name(level: u32) -> String {
    format!("sp_{level}")
}

/// Transaction nesting state for one connection.
#[derive(Debug, Default)]
pub struct TransactionManager {
    depth: u32,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open logical transactions.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Open a transaction, or a savepoint when one is already open.
    pub async fn begin<D: Driver>(&mut self, driver: &D) -> OrmResult<()> {
        if self.depth == 0 {
            driver.begin().await?;
        } else {
            let sql = format!("SAVEPOINT {}", savepoint_name(self.depth));
            driver.batch_execute(&sql).await?;
        }
        self.depth += 1;
        tracing::info!(target: "pgmanager.tx", level = self.depth, "begin");
        Ok(())
    }

    /// Commit the innermost level. No-op outside a transaction.
    pub async fn commit<D: Driver>(&mut self, driver: &D) -> OrmResult<()> {
        if self.depth == 0 {
            return Ok(());
        }
        let previous = self.depth;
        self.depth -= 1;
        let result = if self.depth == 0 {
            driver.commit().await
        } else {
            let sql = format!("RELEASE SAVEPOINT {}", savepoint_name(self.depth));
            driver.batch_execute(&sql).await
        };
        if let Err(e) = result {
            self.depth = previous;
            tracing::warn!(target: "pgmanager.tx", level = previous, error = %e, "commit failed");
            return Err(e);
        }
        tracing::info!(target: "pgmanager.tx", level = previous, "commit");
        Ok(())
    }

    /// Roll back the innermost level. No-op outside a transaction.
    ///
    /// The level is given up even when the driver reports a failure.
    pub async fn rollback<D: Driver>(&mut self, driver: &D) -> OrmResult<()> {
        if self.depth == 0 {
            return Ok(());
        }
        let previous = self.depth;
        self.depth -= 1;
        let result = if self.depth == 0 {
            driver.rollback().await
        } else {
            let sql = format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(self.depth));
            driver.batch_execute(&sql).await
        };
        match &result {
            Ok(()) => tracing::info!(target: "pgmanager.tx", level = previous, "rollback"),
            Err(e) => {
                tracing::warn!(target: "pgmanager.tx", level = previous, error = %e, "rollback failed")
            }
        }
        result
    }
}

/// Result of [`DbManager::safe_transaction`](crate::DbManager::safe_transaction).
///
/// `is_committed()` is the success flag; on failure the cause is always
/// available through `error()`.
#[derive(Debug)]
#[must_use]
pub enum TransactionOutcome<T, E = OrmError> {
    /// The callback succeeded and its level was committed.
    Committed(T),
    /// The callback (or the commit) failed and its level was rolled back.
    RolledBack(E),
}

impl<T, E> TransactionOutcome<T, E> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// The captured error, if the level was rolled back.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Committed(_) => None,
            Self::RolledBack(e) => Some(e),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Committed(v) => Some(v),
            Self::RolledBack(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Committed(v) => Ok(v),
            Self::RolledBack(e) => Err(e),
        }
    }
}

impl<T, E> From<Result<T, E>> for TransactionOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Committed(v),
            Err(e) => Self::RolledBack(e),
        }
    }
}
