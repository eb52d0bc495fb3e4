use super::DbManager;
use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::transaction::TransactionOutcome;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<D: Driver> DbManager<D> {
    /// Open a transaction, or a savepoint when one is already open.
    pub async fn begin_transaction(&mut self) -> OrmResult<()> {
        match self.tx.begin(&self.driver).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.wrap_error("begin_transaction", e, false)),
        }
    }

    /// Commit the innermost level.
    pub async fn commit(&mut self) -> OrmResult<()> {
        match self.tx.commit(&self.driver).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.wrap_error("commit", e, false)),
        }
    }

    /// Roll back the innermost level.
    pub async fn roll_back(&mut self) -> OrmResult<()> {
        match self.tx.rollback(&self.driver).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.wrap_error("roll_back", e, false)),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.in_transaction()
    }

    pub fn transaction_level(&self) -> u32 {
        self.tx.depth()
    }

    /// Roll back after a failure that is already being reported.
    async fn roll_back_quietly(&mut self) {
        if let Err(e) = self.roll_back().await {
            tracing::warn!(target: "pgmanager.tx", error = %e.root(), "rollback after failure also failed");
        }
    }

    /// Run `f` inside a transaction level.
    ///
    /// Commits when `f` returns `Ok`. When `f` fails, or the commit does, the
    /// level is rolled back and the error returned. A panic in `f` rolls the
    /// level back and keeps unwinding. Nested calls only touch their own savepoint.
    ///
    /// ```ignore
    /// let id = db
    ///     .transaction(async |db: &mut DbManager| -> OrmResult<i64> {
    ///         let id = db.table("author").insert(record! { "name" => "Hugo" }).await?;
    ///         db.table("book").insert(record! { "author_id" => id, "title" => "Les Misérables" }).await?;
    ///         Ok(id)
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T, E>,
        E: From<OrmError>,
    {
        self.begin_transaction().await?;
        let outcome = AssertUnwindSafe(f(&mut *self)).catch_unwind().await;
        match outcome {
            Ok(Ok(value)) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.roll_back_quietly().await;
                    Err(e.into())
                }
            },
            Ok(Err(e)) => {
                self.roll_back_quietly().await;
                Err(e)
            }
            Err(payload) => {
                self.roll_back_quietly().await;
                panic::resume_unwind(payload)
            }
        }
    }

    /// Like [`transaction`](Self::transaction) but never fails or unwinds.
    ///
    /// The outcome says whether the level was committed and, if not, why.
    /// Panics surface as [`OrmError::Panicked`].
    pub async fn safe_transaction<T, E, F>(&mut self, f: F) -> TransactionOutcome<T, E>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T, E>,
        E: From<OrmError>,
    {
        match AssertUnwindSafe(self.transaction(f)).catch_unwind().await {
            Ok(result) => result.into(),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(target: "pgmanager.tx", panic = %message, "transaction callback panicked");
                TransactionOutcome::RolledBack(OrmError::Panicked(message).into())
            }
        }
    }
}
