//! Error types for pgmanager

use thiserror::Error;

/// Result type alias for pgmanager operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Display text used for execution errors when debug mode is off.
pub const OPAQUE_ERROR_MESSAGE: &str = "database error, please contact administrator";

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error (bad DSN, authentication, unreachable host)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error. Always raised before any SQL reaches the driver.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A driver error caught at the facade boundary.
    ///
    /// `message` is either the detailed report (debug mode) or
    /// [`OPAQUE_ERROR_MESSAGE`]. The driver error is kept as the source.
    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Box<OrmError>,
    },

    /// A transaction callback panicked; the transaction level was rolled back.
    #[error("Transaction callback panicked: {0}")]
    Panicked(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a unique violation error, looking through facade wrapping.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.root(), Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error came from the driver (directly or wrapped by the facade).
    pub fn is_execution(&self) -> bool {
        matches!(
            self.root(),
            Self::Query(_)
                | Self::UniqueViolation(_)
                | Self::ForeignKeyViolation(_)
                | Self::CheckViolation(_)
                | Self::Decode { .. }
                | Self::Other(_)
        )
    }

    /// The innermost error, unwrapping [`OrmError::Execution`] layers.
    pub fn root(&self) -> &OrmError {
        let mut err = self;
        while let Self::Execution { source, .. } = err {
            err = source;
        }
        err
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
