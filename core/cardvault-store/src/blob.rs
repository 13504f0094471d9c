//! Blob storage abstraction.
//!
//! Blobs are opaque bytes addressed by a logical key. Card images live
//! under `{account}/cards/{card_id}`.

use async_trait::async_trait;
use cardvault_types::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreResult;

const CARD_IMAGES: &str = "cards";

/// Logical key of a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    /// Key of the image that belongs to a card.
    pub fn card_image(account: &AccountId, card_id: &str) -> Self {
        Self(format!("{}{card_id}", Self::card_images_prefix(account)))
    }

    /// Prefix shared by every card image of an account.
    pub fn card_images_prefix(account: &AccountId) -> String {
        format!("{account}/{CARD_IMAGES}/")
    }

    /// Wraps a raw key, e.g. one read back from a listing.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the card id if this is a card image key of `account`.
    pub fn card_id(&self, account: &AccountId) -> Option<&str> {
        self.0
            .strip_prefix(&Self::card_images_prefix(account))
            .filter(|id| !id.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub key: BlobKey,
    pub content_type: String,
    pub size: u64,
}

/// Maps a file extension to a content type. Unknown extensions map to
/// `application/octet-stream`.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Inverse of [`content_type_for_extension`].
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

/// Blob storage backend.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores bytes under `key`, replacing any previous blob.
    async fn upload(&self, key: &BlobKey, content: &[u8], content_type: &str) -> StoreResult<BlobRef>;

    /// Reads a blob's bytes.
    async fn download(&self, key: &BlobKey) -> StoreResult<Vec<u8>>;

    /// Lists blobs whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobRef>>;
}
