//! The driver seam between the facade and a concrete SQL client.

use crate::error::OrmResult;
use crate::record::Record;
use crate::value::Value;
use std::future::Future;

/// A connection capable of running SQL with positional (`$n`) parameters.
///
/// [`DbManager`](crate::DbManager) owns exactly one driver. Statement
/// preparation is the driver's business; callers only hand over SQL text and
/// values. The production implementation is [`PgDriver`](crate::PgDriver).
pub trait Driver: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, values: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute one or more statements without parameters.
    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send;

    /// Open the top-level transaction.
    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("BEGIN")
    }

    /// Commit the top-level transaction.
    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("COMMIT")
    }

    /// Roll back the top-level transaction.
    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("ROLLBACK")
    }

    /// Release the connection.
    fn close(self) -> impl Future<Output = OrmResult<()>> + Send
    where
        Self: Sized,
    {
        async { Ok(()) }
    }
}
