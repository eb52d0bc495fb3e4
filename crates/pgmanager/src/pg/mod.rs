//! PostgreSQL driver built on `tokio-postgres`.
//!
//! # Example
//!
//! ```ignore
//! use pgmanager::{ConnectOptions, PgDriver};
//!
//! let driver = PgDriver::connect(
//!     ConnectOptions::new("localhost", "app", "secret", "library").port(5432),
//! )
//! .await?;
//! ```

mod config;
mod decode;

pub use config::ConnectOptions;

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;
use tokio::task::JoinHandle;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Socket};

/// A single PostgreSQL connection.
///
/// The connection future runs on a spawned tokio task; [`Driver::close`] drops
/// the client and waits for that task to finish.
pub struct PgDriver {
    client: tokio_postgres::Client,
    connection: JoinHandle<()>,
}

impl PgDriver {
    /// Connect without TLS.
    pub async fn connect(options: ConnectOptions) -> OrmResult<Self> {
        Self::connect_with_tls(options, NoTls).await
    }

    /// Connect using a custom TLS connector.
    pub async fn connect_with_tls<T>(options: ConnectOptions, tls: T) -> OrmResult<Self>
    where
        T: MakeTlsConnect<Socket> + Send + 'static,
        T::Stream: Send + 'static,
        T::TlsConnect: Send,
        <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
    {
        let (client, connection) = options
            .into_config()
            .connect(tls)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "pgmanager.sql", error = %e, "postgres connection error");
            }
        });

        tracing::debug!(target: "pgmanager.sql", "connection established");
        Ok(Self { client, connection })
    }

    /// Borrow the underlying `tokio_postgres::Client` for anything the facade does not cover.
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }
}

fn as_params(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Driver for PgDriver {
    async fn query(&self, sql: &str, values: &[Value]) -> OrmResult<Vec<Record>> {
        let params = as_params(values);
        let rows = self
            .client
            .query(sql, &params)
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(decode::row_to_record).collect()
    }

    async fn execute(&self, sql: &str, values: &[Value]) -> OrmResult<u64> {
        let params = as_params(values);
        self.client
            .execute(sql, &params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn close(self) -> OrmResult<()> {
        let Self { client, connection } = self;
        drop(client);
        connection
            .await
            .map_err(|e| OrmError::Connection(format!("connection task failed: {e}")))
    }
}
