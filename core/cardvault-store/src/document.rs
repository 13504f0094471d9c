//! Document store abstraction.
//!
//! The store holds one data set per account: collections, cards, sold items
//! and a profile. Query and index semantics are up to the backend; the
//! migration engine only relies on the operations below.

use async_trait::async_trait;
use cardvault_types::{AccountId, Card, Collection, CollectionId, Profile, SoldItem};

use crate::error::StoreResult;

/// A group of records committed in one atomic write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBatch {
    Cards(Vec<Card>),
    Sold(Vec<SoldItem>),
}

impl WriteBatch {
    pub fn len(&self) -> usize {
        match self {
            WriteBatch::Cards(cards) => cards.len(),
            WriteBatch::Sold(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the logical bucket the batch writes into.
    pub fn bucket(&self) -> &'static str {
        match self {
            WriteBatch::Cards(_) => "cards",
            WriteBatch::Sold(_) => "sold",
        }
    }
}

/// Per-account document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists every collection of the account.
    async fn list_collections(&self, account: &AccountId) -> StoreResult<Vec<Collection>>;

    /// Creates an empty collection. Fails if the name is already taken.
    async fn create_collection(&self, account: &AccountId, name: &str) -> StoreResult<Collection>;

    /// Commits a batch atomically: either every record is written or none.
    /// Records are upserted by id.
    async fn commit_batch(&self, account: &AccountId, batch: WriteBatch) -> StoreResult<()>;

    /// Counts the cards currently stored in a collection.
    async fn count_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<u64>;

    /// Persists a collection's card count.
    async fn set_card_count(
        &self,
        account: &AccountId,
        collection: &CollectionId,
        count: u64,
    ) -> StoreResult<()>;

    /// Lists the cards of a collection in write order.
    async fn list_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<Vec<Card>>;

    /// Lists up to `limit` sold items, most recently written first.
    async fn list_sold(&self, account: &AccountId, limit: usize) -> StoreResult<Vec<SoldItem>>;

    async fn get_profile(&self, account: &AccountId) -> StoreResult<Option<Profile>>;

    /// Replaces the profile as a whole.
    async fn put_profile(&self, account: &AccountId, profile: Profile) -> StoreResult<()>;
}
