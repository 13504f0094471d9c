//! Export and import of Card Vault accounts.
//!
//! Import accepts a single JSON document in any of the historical export
//! shapes, or a zip bundle:
//! - [`normalize`] turns any recognized document into one canonical list
//! - [`reconcile`] maps source collections onto the account's collections
//!   by folded name, creating only what is missing
//! - [`batch`] writes cards and sold items in bounded atomic batches
//! - [`assets`] uploads card images concurrently with the record writes
//!
//! Export runs the other way: [`ArchiveBuilder`] reads the account and
//! writes a bundle the importer reads back unchanged.
//!
//! [`Migrator`] is the entry point for both directions.

pub mod assets;
pub mod batch;
mod builder;
mod config;
mod error;
pub mod layout;
mod migrator;
pub mod normalize;
mod reader;
pub mod reconcile;
mod stats;

pub use assets::{AssetEntry, AssetImporter, card_id_from_path};
pub use batch::BatchWriter;
pub use builder::{ArchiveBuilder, ExportBundle};
pub use config::{
    ASSET_CONCURRENCY, BUNDLE_BATCH_SIZE, DOCUMENT_BATCH_SIZE, FALLBACK_COLLECTION, MigrationConfig,
    RetryPolicy, SOLD_ITEMS_EXPORT_LIMIT,
};
pub use error::{MigrateError, MigrateResult};
pub use migrator::Migrator;
pub use normalize::{
    DocumentShape, NormalizeError, NormalizedCollection, NormalizedDocument, SoldItemsDocument,
    detect_shape, normalize, parse_sold_items, take_embedded_sold_items,
};
pub use reader::{BundleContents, BundleInspection, InputKind, inspect_bundle};
pub use reconcile::{CollectionReconciler, Reconciliation, Resolution, fold_name};
pub use stats::{AssetOutcome, ExportSummary, ImportResult, ImportStats, OperationOutcome, WriteOutcome};
