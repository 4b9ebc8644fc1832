//! Query error types

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Pagination cursor failed to decode
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Lookback argument is not a valid non-negative integer
    #[error("Invalid lookback: {0}")]
    InvalidLookback(String),

    /// Index store error
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
