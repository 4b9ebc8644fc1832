//! Index store error types

use thiserror::Error;

/// Errors that can occur in the index store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend (SQLite) operation failed
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Record payload failed to serialize or deserialize
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O failure while opening or preparing the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
