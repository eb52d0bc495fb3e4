use crate::error::{OrmError, OrmResult};
use std::time::Duration;

/// Connection parameters for [`PgDriver`](super::PgDriver).
///
/// Mirrors the classic `connect(host, user, pass, db, port, options)` call and
/// maps onto `tokio_postgres::Config`.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    config: tokio_postgres::Config,
}

impl ConnectOptions {
    /// Host, user, password and database name; port defaults to 5432.
    pub fn new(host: &str, user: &str, password: &str, dbname: &str) -> Self {
        let mut config = tokio_postgres::Config::new();
        config.host(host).user(user).dbname(dbname);
        if !password.is_empty() {
            config.password(password);
        }
        Self { config }
    }

    /// Parse a `postgres://` URL or a `key=value` connection string.
    pub fn from_url(url: &str) -> OrmResult<Self> {
        let config = url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port(port);
        self
    }

    /// Name reported in `pg_stat_activity`.
    pub fn application_name(mut self, name: &str) -> Self {
        self.config.application_name(name);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout(timeout);
        self
    }

    /// Run-time parameters sent at startup, e.g. `-c search_path=app`.
    pub fn options(mut self, options: &str) -> Self {
        self.config.options(options);
        self
    }

    /// Add one `-c key=value` startup parameter, keeping previously set ones.
    pub fn option(mut self, key: &str, value: &str) -> Self {
        let existing = self.config.get_options().unwrap_or_default();
        let opt = format!("-c {key}={value}");
        let merged = if existing.is_empty() {
            opt
        } else {
            format!("{existing} {opt}")
        };
        self.config.options(&merged);
        self
    }

    pub fn as_config(&self) -> &tokio_postgres::Config {
        &self.config
    }

    pub fn into_config(self) -> tokio_postgres::Config {
        self.config
    }
}

impl From<tokio_postgres::Config> for ConnectOptions {
    fn from(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_config_from_parts() {
        let opts = ConnectOptions::new("localhost", "app", "secret", "library")
            .port(5433)
            .application_name("pgmanager-test");
        let cfg = opts.as_config();
        assert_eq!(cfg.get_user(), Some("app"));
        assert_eq!(cfg.get_dbname(), Some("library"));
        assert_eq!(cfg.get_ports(), &[5433]);
        assert_eq!(cfg.get_password(), Some(&b"secret"[..]));
        assert_eq!(cfg.get_application_name(), Some("pgmanager-test"));
    }

    #[test]
    fn merges_startup_options() {
        let opts = ConnectOptions::new("h", "u", "", "d")
            .option("search_path", "app")
            .option("statement_timeout", "5s");
        assert_eq!(
            opts.as_config().get_options(),
            Some("-c search_path=app -c statement_timeout=5s")
        );
        assert_eq!(opts.as_config().get_password(), None);
    }

    #[test]
    fn bad_url_is_connection_error() {
        let err = ConnectOptions::from_url("postgres://user@host:notaport/db").unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));
    }
}
