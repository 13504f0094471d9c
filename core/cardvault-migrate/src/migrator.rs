//! The export/import facade.
//!
//! A [`Migrator`] is bound to one account of one store. Imports accept
//! either a single JSON document or a zip bundle; exports always produce a
//! bundle.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

use cardvault_store::{BlobStorage, DocumentStore, StoreError};
use cardvault_types::{AccountId, CollectionId, Fields, Profile, SoldItem, record_id_of};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assets::AssetImporter;
use crate::batch::BatchWriter;
use crate::builder::{ArchiveBuilder, ExportBundle};
use crate::config::MigrationConfig;
use crate::error::MigrateResult;
use crate::layout::{COLLECTIONS_ENTRY, PROFILE_ENTRY, SOLD_ITEMS_ENTRY};
use crate::normalize::{
    NormalizedCollection, NormalizedDocument, SoldItemsDocument, normalize, parse_sold_items,
    take_embedded_sold_items,
};
use crate::reader::{BundleContents, InputKind};
use crate::reconcile::{CollectionReconciler, Resolution};
use crate::stats::{ImportResult, ImportStats, OperationOutcome, WriteOutcome};

type CollectionMapping = BTreeMap<String, CollectionId>;

/// Where the source collections of one import ended up.
#[derive(Debug, Default)]
struct Mapping {
    by_old_id: CollectionMapping,
    by_name: CollectionMapping,
}

pub struct Migrator {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStorage>,
    account: AccountId,
    config: MigrationConfig,
}

impl Migrator {
    /// Binds a migrator to `account`. Fails if `config` is invalid.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStorage>,
        account: AccountId,
        config: MigrationConfig,
    ) -> MigrateResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            blobs,
            account,
            config,
        })
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Imports a user-supplied file, choosing the path from its extension.
    pub async fn import_file(&self, file_name: &str, bytes: &[u8]) -> MigrateResult<ImportResult> {
        let kind = InputKind::from_file_name(file_name)?;
        info!(account = %self.account, file = %file_name, ?kind, size = bytes.len(), "starting import");

        let result = match kind {
            InputKind::Document => self.import_document(bytes).await?,
            InputKind::Bundle => self.import_bundle(bytes).await?,
        };

        info!(
            account = %self.account,
            imported = result.imported_count,
            errors = result.error_count,
            "import finished"
        );
        Ok(result)
    }

    /// Imports a single JSON document. Every card lands in one collection:
    /// the first existing non-system collection, or the fallback collection.
    pub async fn import_document(&self, bytes: &[u8]) -> MigrateResult<ImportResult> {
        let mut value: Value = serde_json::from_slice(bytes)?;
        let embedded_sold = take_embedded_sold_items(&mut value);
        let doc = normalize(value)?;
        debug!(shape = ?doc.shape, cards = doc.card_count(), "document normalized");

        let (target, mut stats) = self.document_target().await?;

        let mut mapping = Mapping::default();
        for collection in &doc.collections {
            if let Some(old_id) = &collection.id {
                mapping.by_old_id.insert(old_id.clone(), target.clone());
            }
            mapping
                .by_name
                .insert(collection.name.trim().to_string(), target.clone());
        }

        let rejected = doc.rejected;
        let mut all_cards = doc.into_all_cards();
        let renumbered = CardIds::default().claim(&mut all_cards);
        let cards = self
            .writer(self.config.document_batch_size)
            .write_into_collection(all_cards, &target)
            .await
            .merge(WriteOutcome::rejected(rejected));
        self.refresh_card_counts().await;
        stats = stats.merge(ImportStats {
            cards,
            cards_renumbered: renumbered,
            ..ImportStats::default()
        });

        if let Some(sold) = embedded_sold {
            stats = stats.merge(
                self.import_sold_items(sold, self.config.document_batch_size)
                    .await,
            );
        }

        Ok(ImportResult::new(stats, mapping.by_old_id).with_names(mapping.by_name))
    }

    /// Imports a zip bundle. Records and assets are imported concurrently.
    pub async fn import_bundle(&self, bytes: &[u8]) -> MigrateResult<ImportResult> {
        let BundleContents {
            collections,
            profile,
            sold_items,
            assets,
            ..
        } = BundleContents::open(Cursor::new(bytes))?;

        let importer = AssetImporter::new(
            self.blobs.as_ref(),
            &self.account,
            self.config.asset_concurrency,
        );
        let (records, assets) = tokio::join!(
            self.import_bundle_records(collections, profile, sold_items),
            importer.import(assets),
        );

        let (stats, mapping) = records?;
        Ok(
            ImportResult::new(stats.merge(ImportStats::with_assets(assets)), mapping.by_old_id)
                .with_names(mapping.by_name),
        )
    }

    /// Builds an export bundle of the whole account.
    pub async fn export(&self) -> MigrateResult<ExportBundle> {
        self.export_at(Utc::now()).await
    }

    pub async fn export_at(&self, at: DateTime<Utc>) -> MigrateResult<ExportBundle> {
        info!(account = %self.account, "starting export");
        ArchiveBuilder::new(self.store.as_ref(), self.blobs.as_ref(), &self.account, &self.config)
            .build_at(at)
            .await
    }

    /// [`import_file`](Self::import_file) wrapped in the caller-facing
    /// envelope.
    pub async fn run_import(&self, file_name: &str, bytes: &[u8]) -> OperationOutcome {
        OperationOutcome::from_import(&self.import_file(file_name, bytes).await)
    }

    async fn import_bundle_records(
        &self,
        collections: Option<Vec<u8>>,
        profile: Option<Vec<u8>>,
        sold_items: Option<Vec<u8>>,
    ) -> MigrateResult<(ImportStats, Mapping)> {
        let mut stats = ImportStats::default();
        let mut mapping = Mapping::default();
        let mut embedded_sold = None;

        if let Some(bytes) = collections {
            match decode_document(COLLECTIONS_ENTRY, &bytes) {
                Some(mut value) => {
                    embedded_sold = take_embedded_sold_items(&mut value);
                    match normalize(value) {
                        Ok(doc) => {
                            let (collection_stats, collection_mapping) =
                                self.import_collections(doc).await?;
                            stats = stats.merge(collection_stats);
                            mapping = collection_mapping;
                        }
                        Err(e) => {
                            warn!(entry = COLLECTIONS_ENTRY, error = %e, "skipping collections document");
                            stats = stats.merge(ImportStats::document_failed());
                        }
                    }
                }
                None => stats = stats.merge(ImportStats::document_failed()),
            }
        }

        if let Some(bytes) = profile {
            stats = stats.merge(self.import_profile(&bytes).await);
        }

        let sold = match sold_items {
            Some(bytes) => match decode_document(SOLD_ITEMS_ENTRY, &bytes).map(parse_sold_items) {
                Some(Some(sold)) => Some(sold),
                Some(None) => {
                    warn!(entry = SOLD_ITEMS_ENTRY, "sold items document holds no array");
                    stats = stats.merge(ImportStats::document_failed());
                    None
                }
                None => {
                    stats = stats.merge(ImportStats::document_failed());
                    None
                }
            },
            None => embedded_sold,
        };
        if let Some(sold) = sold {
            stats = stats.merge(self.import_sold_items(sold, self.config.bundle_batch_size).await);
        }

        Ok((stats, mapping))
    }

    /// Reconciles the document's collections and writes their cards, one
    /// destination collection at a time.
    async fn import_collections(
        &self,
        doc: NormalizedDocument,
    ) -> MigrateResult<(ImportStats, Mapping)> {
        let NormalizedDocument {
            collections: mut named,
            loose_cards,
            rejected,
            ..
        } = doc;
        if !loose_cards.is_empty() {
            named.push(NormalizedCollection {
                id: None,
                name: self.config.fallback_collection.clone(),
                cards: loose_cards,
            });
        }

        let reconciler = CollectionReconciler::load(self.store.as_ref(), &self.account).await?;
        let reconciliation = reconciler.reconcile(&named).await;

        let mut ids = CardIds::default();
        let mut renumbered = 0;
        for collection in &mut named {
            renumbered += ids.claim(&mut collection.cards);
        }

        let mut stats = ImportStats {
            collections_created: reconciliation.created.len(),
            collections_reused: reconciliation.reused,
            cards_renumbered: renumbered,
            ..ImportStats::default()
        };
        let mut cards = WriteOutcome::rejected(rejected);

        // Source collections whose names fold together share a destination.
        let mut groups: Vec<(CollectionId, Vec<Fields>)> = Vec::new();
        for collection in named {
            let Some(id) = reconciliation.resolve(&collection.name) else {
                cards = cards.merge(WriteOutcome::rejected(collection.cards.len()));
                continue;
            };
            match groups.iter_mut().find(|(group, _)| *group == *id) {
                Some((_, group)) => group.extend(collection.cards),
                None => groups.push((id.clone(), collection.cards)),
            }
        }

        let writer = self.writer(self.config.bundle_batch_size);
        for (collection, group) in groups {
            let outcome = writer.write_into_collection(group, &collection).await;
            debug!(collection = %collection, written = outcome.written, failed = outcome.failed, "collection written");
            cards = cards.merge(outcome);
        }
        // A card id already stored elsewhere moves its card, so the source
        // collection needs a recount too.
        self.refresh_card_counts().await;

        stats = stats.merge(ImportStats::with_cards(cards));
        let mapping = Mapping {
            by_old_id: reconciliation.by_old_id,
            by_name: reconciliation.by_source_name,
        };
        Ok((stats, mapping))
    }

    /// Picks the destination of a single-document import.
    async fn document_target(&self) -> MigrateResult<(CollectionId, ImportStats)> {
        let existing = self.store.list_collections(&self.account).await?;
        if let Some(collection) = existing
            .iter()
            .find(|c| !self.config.is_system_collection(&c.name))
        {
            debug!(collection = %collection.name, "importing into existing collection");
            let stats = ImportStats {
                collections_reused: 1,
                ..ImportStats::default()
            };
            return Ok((collection.id.clone(), stats));
        }

        let mut reconciler =
            CollectionReconciler::from_existing(self.store.as_ref(), &self.account, &existing);
        let resolution = reconciler.resolve(&self.config.fallback_collection).await?;
        let stats = match &resolution {
            Resolution::Created(_) => ImportStats {
                collections_created: 1,
                ..ImportStats::default()
            },
            Resolution::Existing(_) => ImportStats {
                collections_reused: 1,
                ..ImportStats::default()
            },
        };
        Ok((resolution.id().clone(), stats))
    }

    async fn import_sold_items(&self, sold: SoldItemsDocument, batch_size: usize) -> ImportStats {
        let items = sold.items.into_iter().map(SoldItem::from_fields).collect();
        let outcome = self
            .writer(batch_size)
            .write_sold(items)
            .await
            .merge(WriteOutcome::rejected(sold.rejected));
        debug!(written = outcome.written, failed = outcome.failed, "sold items imported");
        ImportStats::with_sold(outcome)
    }

    /// Overwrites the profile. Failures are counted against the document.
    async fn import_profile(&self, bytes: &[u8]) -> ImportStats {
        let Some(value) = decode_document(PROFILE_ENTRY, bytes) else {
            return ImportStats::document_failed();
        };
        let profile = match Profile::from_value(value) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(entry = PROFILE_ENTRY, error = %e, "skipping profile document");
                return ImportStats::document_failed();
            }
        };
        match self.store.put_profile(&self.account, profile).await {
            Ok(()) => {
                debug!(account = %self.account, "profile replaced");
                ImportStats::profile()
            }
            Err(e) => {
                warn!(account = %self.account, error = %e, "failed to write profile");
                ImportStats::document_failed()
            }
        }
    }

    /// Recomputes every collection's card count from the stored cards.
    async fn refresh_card_counts(&self) {
        let collections = match self.store.list_collections(&self.account).await {
            Ok(collections) => collections,
            Err(e) => {
                warn!(account = %self.account, error = %e, "failed to list collections for recount");
                return;
            }
        };
        for collection in collections {
            self.refresh_card_count(&collection.id).await;
        }
    }

    async fn refresh_card_count(&self, collection: &CollectionId) {
        let result = async {
            let count = self.store.count_cards(&self.account, collection).await?;
            self.store
                .set_card_count(&self.account, collection, count)
                .await?;
            Ok::<_, StoreError>(count)
        }
        .await;
        match result {
            Ok(count) => debug!(collection = %collection, count, "card count refreshed"),
            Err(e) => warn!(collection = %collection, error = %e, "failed to refresh card count"),
        }
    }

    fn writer(&self, batch_size: usize) -> BatchWriter<'_> {
        BatchWriter::new(self.store.as_ref(), &self.account, batch_size, &self.config.retry)
    }
}

/// Card ids claimed so far by one import.
#[derive(Debug, Default)]
struct CardIds(HashSet<String>);

impl CardIds {
    /// Claims the id of every card. A card repeating an earlier id gets
    /// `{id}-{n}` with the smallest free `n`, so re-importing the same file
    /// yields the same ids. Returns how many cards were renumbered.
    fn claim(&mut self, cards: &mut [Fields]) -> usize {
        let mut renumbered = 0;
        for fields in cards {
            let Some(id) = record_id_of(fields) else {
                continue;
            };
            if self.0.insert(id.clone()) {
                continue;
            }
            let mut n = 2;
            let fresh = loop {
                let candidate = format!("{id}-{n}");
                if !self.0.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            debug!(source_id = %id, id = %fresh, "renumbered repeated card id");
            self.0.insert(fresh.clone());
            fields.insert("id".to_string(), Value::String(fresh));
            renumbered += 1;
        }
        renumbered
    }
}

/// Decodes an optional bundle document, logging instead of failing.
fn decode_document(entry: &str, bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(entry, error = %e, "skipping malformed bundle document");
            None
        }
    }
}

impl OperationOutcome {
    pub fn from_import(result: &MigrateResult<ImportResult>) -> Self {
        match result {
            Ok(result) => Self::success(result.message()),
            Err(e) => Self::failure(format!("Import failed: {e}")),
        }
    }

    pub fn from_export(result: &MigrateResult<ExportBundle>) -> Self {
        match result {
            Ok(bundle) => Self::success(format!("{} to {}", bundle.summary.message(), bundle.file_name)),
            Err(e) => Self::failure(format!("Export failed: {e}")),
        }
    }
}
