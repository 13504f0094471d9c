//! Export bundle construction.
//!
//! Produces the same layout the reader consumes; the collections document
//! uses the `{ "collections": [ {id, name, cards} ] }` shape.

use std::io::Write;

use cardvault_store::{BlobKey, BlobStorage, DocumentStore, extension_for_content_type};
use cardvault_types::AccountId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::config::MigrationConfig;
use crate::error::MigrateResult;
use crate::layout::{
    COLLECTIONS_ENTRY, FORMAT_VERSION, IMAGES_DIR, PROFILE_ENTRY, README_ENTRY, SOLD_ITEMS_ENTRY,
    bundle_file_name, readme,
};
use crate::stats::ExportSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionsDocument {
    version: u32,
    exported_at: String,
    collections: Vec<ExportedCollection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedCollection {
    id: String,
    name: String,
    card_count: usize,
    cards: Vec<Value>,
}

/// A finished export, ready to be offered as a download.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub summary: ExportSummary,
}

/// Collects an account's data and writes it into a zip bundle.
pub struct ArchiveBuilder<'a> {
    store: &'a dyn DocumentStore,
    blobs: &'a dyn BlobStorage,
    account: &'a AccountId,
    config: &'a MigrationConfig,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        blobs: &'a dyn BlobStorage,
        account: &'a AccountId,
        config: &'a MigrationConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            account,
            config,
        }
    }

    pub async fn build(&self) -> MigrateResult<ExportBundle> {
        self.build_at(Utc::now()).await
    }

    /// Builds the bundle as of `at`, which stamps the file name and README.
    pub async fn build_at(&self, at: DateTime<Utc>) -> MigrateResult<ExportBundle> {
        let mut summary = ExportSummary::default();

        let mut collections = Vec::new();
        for collection in self.store.list_collections(self.account).await? {
            let cards: Vec<Value> = self
                .store
                .list_cards(self.account, &collection.id)
                .await?
                .iter()
                .map(|card| card.to_document())
                .collect();
            summary.cards += cards.len();
            collections.push(ExportedCollection {
                id: collection.id.to_string(),
                name: collection.name,
                card_count: cards.len(),
                cards,
            });
        }
        summary.collections = collections.len();

        let profile = self.store.get_profile(self.account).await?;
        summary.profile_included = profile.is_some();

        let mut sold = self
            .store
            .list_sold(self.account, self.config.sold_items_export_limit)
            .await?;
        // Oldest first, so a re-import writes them back in the same order.
        sold.reverse();
        summary.sold_items = sold.len();
        let sold: Vec<Value> = sold.iter().map(|item| item.to_document()).collect();

        let images = self.collect_images(&mut summary).await?;

        let collections_doc = CollectionsDocument {
            version: FORMAT_VERSION,
            exported_at: at.to_rfc3339(),
            collections,
        };

        let buf = std::io::Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(buf);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(README_ENTRY, options)?;
        zip.write_all(readme(self.account.as_str(), at, &summary).as_bytes())?;

        zip.start_file(COLLECTIONS_ENTRY, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&collections_doc)?)?;

        if let Some(profile) = &profile {
            zip.start_file(PROFILE_ENTRY, options)?;
            zip.write_all(&serde_json::to_vec_pretty(profile)?)?;
        }

        zip.start_file(SOLD_ITEMS_ENTRY, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&json!({ "soldCards": sold }))?)?;

        // Images are already compressed.
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (path, bytes) in &images {
            zip.start_file(path.as_str(), stored)?;
            zip.write_all(bytes)?;
        }

        let bytes = zip.finish()?.into_inner();
        info!(
            account = %self.account,
            collections = summary.collections,
            cards = summary.cards,
            sold = summary.sold_items,
            images = summary.images,
            size = bytes.len(),
            "export bundle built"
        );

        Ok(ExportBundle {
            file_name: bundle_file_name(at),
            bytes,
            summary,
        })
    }

    /// Downloads every card image of the account. Unreadable images are
    /// skipped and counted.
    async fn collect_images(&self, summary: &mut ExportSummary) -> MigrateResult<Vec<(String, Vec<u8>)>> {
        let prefix = BlobKey::card_images_prefix(self.account);
        let mut images = Vec::new();

        for blob in self.blobs.list(&prefix).await? {
            let Some(card_id) = blob.key.card_id(self.account) else {
                continue;
            };
            let path = format!(
                "{IMAGES_DIR}/{card_id}.{}",
                extension_for_content_type(&blob.content_type)
            );
            match self.blobs.download(&blob.key).await {
                Ok(bytes) => {
                    debug!(key = %blob.key, "image added to export");
                    images.push((path, bytes));
                }
                Err(e) => {
                    warn!(key = %blob.key, error = %e, "skipping unreadable image");
                    summary.images_failed += 1;
                }
            }
        }

        summary.images = images.len();
        Ok(images)
    }
}
