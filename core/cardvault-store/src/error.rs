//! Store error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by document and blob stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write quota exceeded: batch of {attempted} records, limit is {limit}")]
    QuotaExceeded { attempted: usize, limit: usize },

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true if repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RateLimited { .. } | StoreError::Unavailable(_))
    }

    /// Returns the server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StoreError::RateLimited { retry_after_ms } => Some(Duration::from_millis(*retry_after_ms)),
            _ => None,
        }
    }
}
