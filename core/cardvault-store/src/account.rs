//! Per-account data set shared by the in-memory and local backends.

use std::collections::HashMap;

use cardvault_types::{Card, Collection, CollectionId, Profile, SoldItem};
use serde::{Deserialize, Serialize};

use crate::document::WriteBatch;
use crate::error::{StoreError, StoreResult};

/// A record stamped with its write sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stamped<T> {
    seq: u64,
    record: T,
}

/// Everything stored for one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AccountData {
    next_seq: u64,
    collections: Vec<Collection>,
    cards: HashMap<String, Stamped<Card>>,
    sold: HashMap<String, Stamped<SoldItem>>,
    profile: Option<Profile>,
}

impl AccountData {
    pub(crate) fn collections(&self) -> Vec<Collection> {
        self.collections.clone()
    }

    pub(crate) fn create_collection(&mut self, name: &str) -> StoreResult<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Rejected("collection name is empty".into()));
        }
        let lowered = name.to_lowercase();
        if self.collections.iter().any(|c| c.name.to_lowercase() == lowered) {
            return Err(StoreError::Rejected(format!("collection {name:?} already exists")));
        }
        let collection = Collection::new(name);
        self.collections.push(collection.clone());
        Ok(collection)
    }

    /// Applies a batch. Validation happens before any write so a rejected
    /// batch leaves the data untouched.
    pub(crate) fn apply(&mut self, batch: WriteBatch) -> StoreResult<()> {
        match batch {
            WriteBatch::Cards(cards) => {
                if let Some(orphan) = cards.iter().find(|c| !self.has_collection(&c.collection_id)) {
                    return Err(StoreError::Rejected(format!(
                        "card {} references unknown collection {}",
                        orphan.id, orphan.collection_id
                    )));
                }
                for card in cards {
                    let seq = self.bump();
                    self.cards.insert(card.id.clone(), Stamped { seq, record: card });
                }
            }
            WriteBatch::Sold(items) => {
                for item in items {
                    let seq = self.bump();
                    self.sold.insert(item.id.clone(), Stamped { seq, record: item });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn count_cards(&self, collection: &CollectionId) -> StoreResult<u64> {
        self.require_collection(collection)?;
        Ok(self
            .cards
            .values()
            .filter(|c| &c.record.collection_id == collection)
            .count() as u64)
    }

    pub(crate) fn set_card_count(&mut self, collection: &CollectionId, count: u64) -> StoreResult<()> {
        let entry = self
            .collections
            .iter_mut()
            .find(|c| &c.id == collection)
            .ok_or_else(|| StoreError::NotFound(format!("collection {collection}")))?;
        entry.card_count = count;
        Ok(())
    }

    pub(crate) fn list_cards(&self, collection: &CollectionId) -> StoreResult<Vec<Card>> {
        self.require_collection(collection)?;
        let mut cards: Vec<&Stamped<Card>> = self
            .cards
            .values()
            .filter(|c| &c.record.collection_id == collection)
            .collect();
        cards.sort_by_key(|c| c.seq);
        Ok(cards.into_iter().map(|c| c.record.clone()).collect())
    }

    pub(crate) fn list_sold(&self, limit: usize) -> Vec<SoldItem> {
        let mut items: Vec<&Stamped<SoldItem>> = self.sold.values().collect();
        items.sort_by_key(|s| std::cmp::Reverse(s.seq));
        items.into_iter().take(limit).map(|s| s.record.clone()).collect()
    }

    pub(crate) fn profile(&self) -> Option<Profile> {
        self.profile.clone()
    }

    pub(crate) fn put_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
    }

    fn has_collection(&self, id: &CollectionId) -> bool {
        self.collections.iter().any(|c| &c.id == id)
    }

    fn require_collection(&self, id: &CollectionId) -> StoreResult<()> {
        if self.has_collection(id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("collection {id}")))
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
