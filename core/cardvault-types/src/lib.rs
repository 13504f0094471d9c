//! Core type definitions for Card Vault.
//!
//! This crate defines the canonical records shared by the store and the
//! migration engine:
//! - Account and collection identifiers
//! - Collections, cards, sold items and the account profile
//!
//! Card and sold-item payloads are opaque JSON field maps. Nothing here
//! interprets domain fields beyond the record id.

mod ids;
mod record;

pub use ids::{AccountId, CollectionId, new_record_id};
pub use record::{Card, Collection, Fields, Profile, SoldItem, record_id_of};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("expected a JSON object for {0}")]
    NotAnObject(&'static str),
}
