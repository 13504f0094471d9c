//! Asset import: card images carried in a bundle's `images/` folder.
//!
//! The owning card is inferred from the file name alone
//! (`images/ABC123.jpg` belongs to card `ABC123`). Uploads are independent:
//! one failing never stops the others, and nothing here touches card
//! records.

use cardvault_store::{BlobKey, BlobStorage, content_type_for_extension};
use cardvault_types::AccountId;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::stats::AssetOutcome;

/// One file from the bundle's asset folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub path: String,
    pub content: Vec<u8>,
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Card id for an asset path: the base name without its last extension.
pub fn card_id_from_path(path: &str) -> Option<&str> {
    let base = base_name(path);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    };
    (!stem.trim().is_empty()).then_some(stem)
}

fn extension_of(path: &str) -> &str {
    base_name(path).rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

pub struct AssetImporter<'a> {
    blobs: &'a dyn BlobStorage,
    account: &'a AccountId,
    concurrency: usize,
}

impl<'a> AssetImporter<'a> {
    pub fn new(blobs: &'a dyn BlobStorage, account: &'a AccountId, concurrency: usize) -> Self {
        Self {
            blobs,
            account,
            concurrency: concurrency.max(1),
        }
    }

    /// Uploads every entry, at most `concurrency` at a time.
    pub async fn import(&self, entries: Vec<AssetEntry>) -> AssetOutcome {
        if entries.is_empty() {
            return AssetOutcome::default();
        }
        debug!(account = %self.account, assets = entries.len(), "uploading assets");

        stream::iter(entries)
            .map(|entry| self.upload(entry))
            .buffer_unordered(self.concurrency)
            .fold(AssetOutcome::default(), |total, one| async move { total.merge(one) })
            .await
    }

    async fn upload(&self, entry: AssetEntry) -> AssetOutcome {
        let Some(card_id) = card_id_from_path(&entry.path) else {
            debug!(path = %entry.path, "asset has no card id, skipping");
            return AssetOutcome::skipped();
        };
        let key = BlobKey::card_image(self.account, card_id);
        let content_type = content_type_for_extension(extension_of(&entry.path));

        match self.blobs.upload(&key, &entry.content, content_type).await {
            Ok(blob) => {
                debug!(key = %blob.key, size = blob.size, "asset uploaded");
                AssetOutcome::uploaded()
            }
            Err(e) => {
                warn!(path = %entry.path, key = %key, error = %e, "asset upload failed");
                AssetOutcome::failed()
            }
        }
    }
}
