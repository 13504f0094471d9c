//! In-process store backends.
//!
//! `MemoryStore` enforces a per-batch write quota the way hosted document
//! stores do, so batch sizing bugs show up in tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use cardvault_types::{AccountId, Card, Collection, CollectionId, Profile, SoldItem};
use tokio::sync::RwLock;
use tracing::debug;

use crate::account::AccountData;
use crate::blob::{BlobKey, BlobRef, BlobStorage};
use crate::document::{DocumentStore, WriteBatch};
use crate::error::{StoreError, StoreResult};

/// Default maximum number of records a single batch may write.
pub const DEFAULT_MAX_BATCH_WRITES: usize = 500;

/// Document store held entirely in memory.
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, AccountData>>,
    max_batch_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_writes(DEFAULT_MAX_BATCH_WRITES)
    }

    /// Creates a store that rejects batches larger than `limit`.
    pub fn with_max_batch_writes(limit: usize) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            max_batch_writes: limit,
        }
    }

    async fn read<R>(&self, account: &AccountId, f: impl FnOnce(&AccountData) -> R) -> R {
        let accounts = self.accounts.read().await;
        match accounts.get(account) {
            Some(data) => f(data),
            None => f(&AccountData::default()),
        }
    }

    async fn write<R>(&self, account: &AccountId, f: impl FnOnce(&mut AccountData) -> R) -> R {
        let mut accounts = self.accounts.write().await;
        f(accounts.entry(account.clone()).or_default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collections(&self, account: &AccountId) -> StoreResult<Vec<Collection>> {
        Ok(self.read(account, AccountData::collections).await)
    }

    async fn create_collection(&self, account: &AccountId, name: &str) -> StoreResult<Collection> {
        self.write(account, |data| data.create_collection(name)).await
    }

    async fn commit_batch(&self, account: &AccountId, batch: WriteBatch) -> StoreResult<()> {
        if batch.len() > self.max_batch_writes {
            return Err(StoreError::QuotaExceeded {
                attempted: batch.len(),
                limit: self.max_batch_writes,
            });
        }
        debug!(account = %account, bucket = batch.bucket(), records = batch.len(), "committing batch");
        self.write(account, |data| data.apply(batch)).await
    }

    async fn count_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<u64> {
        self.read(account, |data| data.count_cards(collection)).await
    }

    async fn set_card_count(
        &self,
        account: &AccountId,
        collection: &CollectionId,
        count: u64,
    ) -> StoreResult<()> {
        self.write(account, |data| data.set_card_count(collection, count)).await
    }

    async fn list_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<Vec<Card>> {
        self.read(account, |data| data.list_cards(collection)).await
    }

    async fn list_sold(&self, account: &AccountId, limit: usize) -> StoreResult<Vec<SoldItem>> {
        Ok(self.read(account, |data| data.list_sold(limit)).await)
    }

    async fn get_profile(&self, account: &AccountId) -> StoreResult<Option<Profile>> {
        Ok(self.read(account, AccountData::profile).await)
    }

    async fn put_profile(&self, account: &AccountId, profile: Profile) -> StoreResult<()> {
        self.write(account, |data| data.put_profile(profile)).await;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    content: Vec<u8>,
}

/// Blob storage held entirely in memory.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<BTreeMap<BlobKey, StoredBlob>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn upload(&self, key: &BlobKey, content: &[u8], content_type: &str) -> StoreResult<BlobRef> {
        let blob = StoredBlob {
            content_type: content_type.to_string(),
            content: content.to_vec(),
        };
        self.blobs.write().await.insert(key.clone(), blob);
        Ok(BlobRef {
            key: key.clone(),
            content_type: content_type.to_string(),
            size: content.len() as u64,
        })
    }

    async fn download(&self, key: &BlobKey) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.content.clone())
            .ok_or_else(|| StoreError::NotFound(format!("blob {key}")))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobRef>> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .iter()
            .filter(|(key, _)| key.as_str().starts_with(prefix))
            .map(|(key, blob)| BlobRef {
                key: key.clone(),
                content_type: blob.content_type.clone(),
                size: blob.content.len() as u64,
            })
            .collect())
    }
}
