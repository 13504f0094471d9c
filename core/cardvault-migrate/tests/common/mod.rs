//! Shared fixtures for migration tests: failure-injecting store wrappers
//! and a small bundle writer.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cardvault_store::{
    BlobKey, BlobRef, BlobStorage, DocumentStore, MemoryBlobStorage, MemoryStore, StoreError,
    StoreResult, WriteBatch,
};
use cardvault_types::{AccountId, Card, Collection, CollectionId, Profile, SoldItem};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub fn account() -> AccountId {
    AccountId::parse("collector").unwrap()
}

/// Builds a zip bundle in memory from `(path, bytes)` pairs.
pub fn bundle(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, bytes) in entries {
        zip.start_file(*path, SimpleFileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A [`MemoryStore`] that fails on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Collection names whose creation fails.
    pub fail_create: Mutex<HashSet<String>>,
    /// 0-based indices of `commit_batch` calls that fail permanently.
    pub fail_commits: Mutex<HashSet<usize>>,
    /// Number of upcoming commits that fail with a rate limit.
    pub rate_limited: AtomicUsize,
    pub fail_list: bool,
    pub commits: AtomicUsize,
    /// Sizes of every attempted batch, in call order.
    pub batch_sizes: Mutex<Vec<usize>>,
    pub creates: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(names: &[&str]) -> Self {
        let store = Self::new();
        store
            .fail_create
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        store
    }

    pub fn failing_commits(indices: &[usize]) -> Self {
        let store = Self::new();
        store.fail_commits.lock().unwrap().extend(indices);
        store
    }

    pub fn commit_calls(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list_collections(&self, account: &AccountId) -> StoreResult<Vec<Collection>> {
        if self.fail_list {
            return Err(StoreError::Unavailable("listing disabled".into()));
        }
        self.inner.list_collections(account).await
    }

    async fn create_collection(&self, account: &AccountId, name: &str) -> StoreResult<Collection> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.lock().unwrap().contains(name) {
            return Err(StoreError::Rejected(format!("cannot create {name}")));
        }
        self.inner.create_collection(account, name).await
    }

    async fn commit_batch(&self, account: &AccountId, batch: WriteBatch) -> StoreResult<()> {
        let index = self.commits.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(batch.len());
        if self
            .rate_limited
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::RateLimited { retry_after_ms: 50 });
        }
        if self.fail_commits.lock().unwrap().contains(&index) {
            return Err(StoreError::Unavailable(format!("batch {index} dropped")));
        }
        self.inner.commit_batch(account, batch).await
    }

    async fn count_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<u64> {
        self.inner.count_cards(account, collection).await
    }

    async fn set_card_count(
        &self,
        account: &AccountId,
        collection: &CollectionId,
        count: u64,
    ) -> StoreResult<()> {
        self.inner.set_card_count(account, collection, count).await
    }

    async fn list_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<Vec<Card>> {
        self.inner.list_cards(account, collection).await
    }

    async fn list_sold(&self, account: &AccountId, limit: usize) -> StoreResult<Vec<SoldItem>> {
        self.inner.list_sold(account, limit).await
    }

    async fn get_profile(&self, account: &AccountId) -> StoreResult<Option<Profile>> {
        self.inner.get_profile(account).await
    }

    async fn put_profile(&self, account: &AccountId, profile: Profile) -> StoreResult<()> {
        self.inner.put_profile(account, profile).await
    }
}

/// A [`MemoryBlobStorage`] that refuses uploads for some card ids.
#[derive(Default)]
pub struct FlakyBlobs {
    pub inner: MemoryBlobStorage,
    pub fail_cards: HashSet<String>,
}

impl FlakyBlobs {
    pub fn failing(card_ids: &[&str]) -> Self {
        Self {
            inner: MemoryBlobStorage::new(),
            fail_cards: card_ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait]
impl BlobStorage for FlakyBlobs {
    async fn upload(&self, key: &BlobKey, content: &[u8], content_type: &str) -> StoreResult<BlobRef> {
        if self
            .fail_cards
            .iter()
            .any(|id| key.as_str().ends_with(&format!("/cards/{id}")))
        {
            return Err(StoreError::Unavailable(format!("upload of {key} refused")));
        }
        self.inner.upload(key, content, content_type).await
    }

    async fn download(&self, key: &BlobKey) -> StoreResult<Vec<u8>> {
        self.inner.download(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobRef>> {
        self.inner.list(prefix).await
    }
}
