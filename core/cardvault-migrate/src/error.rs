//! Error types for the migration engine.
//!
//! Only fatal conditions are errors. Recovered failures (a collection that
//! could not be created, a failed batch, a failed upload) are counted in
//! [`ImportStats`](crate::ImportStats) instead.

use cardvault_store::StoreError;
use thiserror::Error;

use crate::normalize::NormalizeError;

/// Result type for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
