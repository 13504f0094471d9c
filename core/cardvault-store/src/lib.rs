//! Storage interfaces for Card Vault.
//!
//! The migration engine talks to two external collaborators:
//! - a [`DocumentStore`] holding collections, cards, sold items and the
//!   profile of each account, written in bounded atomic batches
//! - a [`BlobStorage`] holding binary assets under logical keys
//!
//! Two backends ship with the crate: [`MemoryStore`] / [`MemoryBlobStorage`]
//! for tests and embedding, and [`LocalStore`], a directory on disk that
//! implements both traits.

mod account;
mod blob;
mod document;
mod error;
mod local;
mod memory;

pub use blob::{BlobKey, BlobRef, BlobStorage, content_type_for_extension, extension_for_content_type};
pub use document::{DocumentStore, WriteBatch};
pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use memory::{DEFAULT_MAX_BATCH_WRITES, MemoryBlobStorage, MemoryStore};
