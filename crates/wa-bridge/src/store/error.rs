//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing the message database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rejected or failed a statement.
    #[error("database error while {context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Build a mapper that tags a sqlx error with what the store was doing.
pub(crate) fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |source| StorageError::Database { context, source }
}
