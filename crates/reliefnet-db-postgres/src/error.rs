//! Error types for the PostgreSQL storage backend.

use reliefnet_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection(e.to_string()),
            PostgresError::Config { message } => StorageError::internal(message),
        }
    }
}

/// Checks if a sqlx error is a unique constraint violation.
pub fn is_unique_violation(err: &SqlxError) -> bool {
    matches!(err, SqlxError::Database(db_err) if db_err.is_unique_violation())
}

/// Maps a sqlx error into a generic storage error.
pub fn storage_err(err: SqlxError) -> StorageError {
    StorageError::internal(err.to_string())
}
