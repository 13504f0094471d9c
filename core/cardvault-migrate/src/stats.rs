//! Operation statistics and the caller-facing result envelope.
//!
//! All counters are plain values. Each step returns its own outcome and the
//! caller merges them, so no counter is ever shared between tasks.

use std::collections::BTreeMap;

use cardvault_types::CollectionId;
use serde::{Deserialize, Serialize};

/// Result of writing a list of records in batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub written: usize,
    pub failed: usize,
    /// Batches attempted.
    pub batches: usize,
}

impl WriteOutcome {
    /// One committed batch of `records`.
    pub fn committed(records: usize) -> Self {
        Self {
            written: records,
            failed: 0,
            batches: 1,
        }
    }

    /// One failed batch of `records`.
    pub fn batch_failed(records: usize) -> Self {
        Self {
            written: 0,
            failed: records,
            batches: 1,
        }
    }

    /// Records that never reached a batch (malformed, or whose collection
    /// could not be resolved).
    pub fn rejected(records: usize) -> Self {
        Self {
            written: 0,
            failed: records,
            batches: 0,
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            written: self.written + other.written,
            failed: self.failed + other.failed,
            batches: self.batches + other.batches,
        }
    }
}

/// Result of uploading bundle assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssetOutcome {
    pub uploaded: usize,
    pub failed: usize,
    /// Entries whose file name yields no card id.
    pub skipped: usize,
}

impl AssetOutcome {
    pub fn uploaded() -> Self {
        Self {
            uploaded: 1,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            failed: 1,
            ..Self::default()
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            uploaded: self.uploaded + other.uploaded,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Everything that happened during one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub cards: WriteOutcome,
    pub sold: WriteOutcome,
    pub assets: AssetOutcome,
    pub collections_created: usize,
    pub collections_reused: usize,
    pub profile_imported: bool,
    /// Optional bundle documents that were present but unusable.
    pub documents_failed: usize,
    /// Cards whose source id repeated an earlier card of the same import.
    pub cards_renumbered: usize,
}

impl ImportStats {
    pub fn with_cards(cards: WriteOutcome) -> Self {
        Self {
            cards,
            ..Self::default()
        }
    }

    pub fn with_sold(sold: WriteOutcome) -> Self {
        Self {
            sold,
            ..Self::default()
        }
    }

    pub fn with_assets(assets: AssetOutcome) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }

    pub fn profile() -> Self {
        Self {
            profile_imported: true,
            ..Self::default()
        }
    }

    pub fn document_failed() -> Self {
        Self {
            documents_failed: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            cards: self.cards.merge(other.cards),
            sold: self.sold.merge(other.sold),
            assets: self.assets.merge(other.assets),
            collections_created: self.collections_created + other.collections_created,
            collections_reused: self.collections_reused + other.collections_reused,
            profile_imported: self.profile_imported || other.profile_imported,
            documents_failed: self.documents_failed + other.documents_failed,
            cards_renumbered: self.cards_renumbered + other.cards_renumbered,
        }
    }

    /// Records written: cards and sold items.
    pub fn imported_count(&self) -> usize {
        self.cards.written + self.sold.written
    }

    /// Records that could not be written: cards and sold items.
    pub fn error_count(&self) -> usize {
        self.cards.failed + self.sold.failed
    }
}

/// What an import hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported_count: usize,
    pub error_count: usize,
    /// Source collection id → destination collection id, for source
    /// collections that carried an id.
    pub collection_mapping: BTreeMap<String, CollectionId>,
    /// Source collection name → destination collection id.
    pub collection_names: BTreeMap<String, CollectionId>,
    pub stats: ImportStats,
}

impl ImportResult {
    pub fn new(stats: ImportStats, collection_mapping: BTreeMap<String, CollectionId>) -> Self {
        Self {
            imported_count: stats.imported_count(),
            error_count: stats.error_count(),
            collection_mapping,
            collection_names: BTreeMap::new(),
            stats,
        }
    }

    #[must_use]
    pub fn with_names(mut self, names: BTreeMap<String, CollectionId>) -> Self {
        self.collection_names = names;
        self
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        let s = &self.stats;
        let mut message = format!(
            "Imported {} records ({} cards, {} sold items) with {} errors",
            self.imported_count, s.cards.written, s.sold.written, self.error_count
        );
        if s.collections_created + s.collections_reused > 0 {
            message.push_str(&format!(
                "; collections: {} created, {} reused",
                s.collections_created, s.collections_reused
            ));
        }
        if s.profile_imported {
            message.push_str("; profile restored");
        }
        if s.assets.uploaded + s.assets.failed > 0 {
            message.push_str(&format!(
                "; images: {} uploaded, {} failed",
                s.assets.uploaded, s.assets.failed
            ));
        }
        if s.documents_failed > 0 {
            message.push_str(&format!("; {} documents unreadable", s.documents_failed));
        }
        message
    }
}

/// Counts of what went into an export bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub collections: usize,
    pub cards: usize,
    pub sold_items: usize,
    pub images: usize,
    /// Images listed in blob storage that could not be downloaded.
    pub images_failed: usize,
    pub profile_included: bool,
}

impl ExportSummary {
    pub fn message(&self) -> String {
        let mut message = format!(
            "Exported {} collections with {} cards, {} sold items and {} images",
            self.collections, self.cards, self.sold_items, self.images
        );
        if self.images_failed > 0 {
            message.push_str(&format!(" ({} images could not be read)", self.images_failed));
        }
        message
    }
}

/// The `{ success, message }` envelope returned for every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
