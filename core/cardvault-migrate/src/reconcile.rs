//! Collection reconciliation.
//!
//! Maps the collections named in an import onto the destination account:
//! a collection whose folded name already exists is reused, anything else
//! is created once and then reused for the rest of the import.

use std::collections::{BTreeMap, HashMap, HashSet};

use cardvault_store::{DocumentStore, StoreResult};
use cardvault_types::{AccountId, Collection, CollectionId};
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::normalize::NormalizedCollection;

/// Comparison key for collection names: NFKC, whitespace runs collapsed
/// to one space, surrounding whitespace dropped, lowercased.
pub fn fold_name(name: &str) -> String {
    let normalized: String = name.nfkc().collect();
    normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How a single name was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(CollectionId),
    Created(Collection),
}

impl Resolution {
    pub fn id(&self) -> &CollectionId {
        match self {
            Resolution::Existing(id) => id,
            Resolution::Created(collection) => &collection.id,
        }
    }
}

/// Outcome of reconciling every collection of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Source collection id → destination id.
    pub by_old_id: BTreeMap<String, CollectionId>,
    /// Folded name → destination id, for every resolved collection.
    pub by_name: HashMap<String, CollectionId>,
    /// Source name, trimmed → destination id.
    pub by_source_name: BTreeMap<String, CollectionId>,
    pub created: Vec<Collection>,
    /// Pre-existing collections matched by name.
    pub reused: usize,
    /// Names whose collection could not be created.
    pub failed: Vec<String>,
}

impl Reconciliation {
    /// Destination id for a collection name, if it was resolved.
    pub fn resolve(&self, name: &str) -> Option<&CollectionId> {
        self.by_name.get(&fold_name(name))
    }
}

/// Resolves collection names against one account's collections.
pub struct CollectionReconciler<'a> {
    store: &'a dyn DocumentStore,
    account: &'a AccountId,
    /// Folded name → id; the existing collections plus everything created
    /// so far.
    index: HashMap<String, CollectionId>,
    existing: HashSet<CollectionId>,
}

impl<'a> CollectionReconciler<'a> {
    /// Fetches the account's collections once and indexes them.
    pub async fn load(store: &'a dyn DocumentStore, account: &'a AccountId) -> StoreResult<Self> {
        let existing = store.list_collections(account).await?;
        debug!(account = %account, collections = existing.len(), "indexed existing collections");
        Ok(Self::from_existing(store, account, &existing))
    }

    /// Builds a reconciler from an already fetched collection list.
    pub fn from_existing(
        store: &'a dyn DocumentStore,
        account: &'a AccountId,
        existing: &[Collection],
    ) -> Self {
        let mut index = HashMap::with_capacity(existing.len());
        for collection in existing {
            // First one wins if the store already holds folded duplicates.
            index
                .entry(fold_name(&collection.name))
                .or_insert_with(|| collection.id.clone());
        }
        Self {
            store,
            account,
            index,
            existing: existing.iter().map(|c| c.id.clone()).collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&CollectionId> {
        self.index.get(&fold_name(name))
    }

    /// Resolves one name, creating the collection if nothing matches.
    pub async fn resolve(&mut self, name: &str) -> StoreResult<Resolution> {
        let folded = fold_name(name);
        if let Some(id) = self.index.get(&folded) {
            return Ok(Resolution::Existing(id.clone()));
        }
        let collection = self.store.create_collection(self.account, name.trim()).await?;
        info!(account = %self.account, collection = %collection.name, id = %collection.id, "created collection");
        self.index.insert(folded, collection.id.clone());
        Ok(Resolution::Created(collection))
    }

    /// Resolves every collection of an import. Creation failures are
    /// recorded and do not stop the remaining collections.
    pub async fn reconcile(mut self, collections: &[NormalizedCollection]) -> Reconciliation {
        let mut result = Reconciliation::default();
        let mut failed: HashSet<String> = HashSet::new();
        let mut reused: HashSet<CollectionId> = HashSet::new();

        for collection in collections {
            let folded = fold_name(&collection.name);
            if failed.contains(&folded) {
                continue;
            }
            match self.resolve(&collection.name).await {
                Ok(resolution) => {
                    let id = resolution.id().clone();
                    match resolution {
                        Resolution::Created(created) => result.created.push(created),
                        Resolution::Existing(id) => {
                            if self.existing.contains(&id) {
                                reused.insert(id);
                            }
                        }
                    }
                    if let Some(old_id) = &collection.id {
                        result.by_old_id.insert(old_id.clone(), id.clone());
                    }
                    result
                        .by_source_name
                        .insert(collection.name.trim().to_string(), id.clone());
                    result.by_name.insert(folded, id);
                }
                Err(e) => {
                    warn!(
                        account = %self.account,
                        collection = %collection.name,
                        error = %e,
                        "failed to create collection, its cards will be skipped"
                    );
                    result.failed.push(collection.name.clone());
                    failed.insert(folded);
                }
            }
        }

        result.reused = reused.len();
        result
    }
}
