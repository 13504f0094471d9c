//! Migration settings.
//!
//! Every knob has a default, so an empty TOML file is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, MigrateResult};

/// Batch size used when importing a single structured document.
pub const DOCUMENT_BATCH_SIZE: usize = 500;
/// Batch size used when importing a bundle.
pub const BUNDLE_BATCH_SIZE: usize = 250;
/// Maximum number of sold items written to an export.
pub const SOLD_ITEMS_EXPORT_LIMIT: usize = 1000;
/// Maximum number of asset uploads in flight.
pub const ASSET_CONCURRENCY: usize = 8;
/// Name of the collection that receives cards without a collection.
pub const FALLBACK_COLLECTION: &str = "Imported Cards";

/// Retry behavior for batch commits that fail with a transient error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based). Doubles each
    /// time, capped at `max_backoff_ms`, and never shorter than the store's
    /// own hint.
    pub fn delay_after(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        let backoff = Duration::from_millis(backoff);
        match hint {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

/// Configuration for export and import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub document_batch_size: usize,
    pub bundle_batch_size: usize,
    pub sold_items_export_limit: usize,
    pub asset_concurrency: usize,
    pub fallback_collection: String,
    /// Collections never picked as the target of a single-document import.
    pub system_collections: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            document_batch_size: DOCUMENT_BATCH_SIZE,
            bundle_batch_size: BUNDLE_BATCH_SIZE,
            sold_items_export_limit: SOLD_ITEMS_EXPORT_LIMIT,
            asset_concurrency: ASSET_CONCURRENCY,
            fallback_collection: FALLBACK_COLLECTION.to_string(),
            system_collections: vec!["Sold".to_string()],
            retry: RetryPolicy::default(),
        }
    }
}

impl MigrationConfig {
    /// Parses and validates a TOML config.
    pub fn from_toml_str(s: &str) -> MigrateResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> MigrateResult<()> {
        if self.document_batch_size == 0 || self.bundle_batch_size == 0 {
            return Err(MigrateError::Config("batch sizes must be at least 1".into()));
        }
        if self.asset_concurrency == 0 {
            return Err(MigrateError::Config("asset_concurrency must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(MigrateError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.fallback_collection.trim().is_empty() {
            return Err(MigrateError::Config("fallback_collection must not be empty".into()));
        }
        Ok(())
    }

    /// Whether `name` is one of the configured system collections.
    pub fn is_system_collection(&self, name: &str) -> bool {
        let folded = crate::reconcile::fold_name(name);
        self.system_collections
            .iter()
            .any(|system| crate::reconcile::fold_name(system) == folded)
    }
}
