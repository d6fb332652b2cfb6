//! Error types for the `ragstore` crate.

use thiserror::Error;

/// Errors that can occur in knowledge-base storage operations.
///
/// Missing rows are not an error: point lookups return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or invalid connection configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied value was rejected before reaching the database.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A connection or statement failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

/// A convenience result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
