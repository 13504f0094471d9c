//! Local-directory store backend.
//!
//! Layout under the root directory:
//! - `accounts/<account>.json`: the account's whole data set
//! - `blobs/<hex(key)>` and `blobs/<hex(key)>.type`: blob bytes and content type
//!
//! Every mutation rewrites the account file through a temporary file and a
//! rename, so a crash never leaves a half-written data set behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cardvault_types::{AccountId, Card, Collection, CollectionId, Profile, SoldItem};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::account::AccountData;
use crate::blob::{BlobKey, BlobRef, BlobStorage};
use crate::document::{DocumentStore, WriteBatch};
use crate::error::{StoreError, StoreResult};

const ACCOUNTS_DIR: &str = "accounts";
const BLOBS_DIR: &str = "blobs";
const CONTENT_TYPE_SUFFIX: &str = ".type";

/// Store backed by a directory on the local file system.
pub struct LocalStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on account files.
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(ACCOUNTS_DIR)).await?;
        fs::create_dir_all(root.join(BLOBS_DIR)).await?;
        info!("Opened local store at {:?}", root);
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn account_path(&self, account: &AccountId) -> PathBuf {
        self.root.join(ACCOUNTS_DIR).join(format!("{account}.json"))
    }

    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        self.root.join(BLOBS_DIR).join(hex::encode(key.as_str()))
    }

    async fn load(&self, account: &AccountId) -> StoreResult<AccountData> {
        let path = self.account_path(account);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AccountData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, account: &AccountId, data: &AccountData) -> StoreResult<()> {
        let path = self.account_path(account);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(data)?).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Saved account file {:?}", path);
        Ok(())
    }

    async fn update<R>(
        &self,
        account: &AccountId,
        f: impl FnOnce(&mut AccountData) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load(account).await?;
        let result = f(&mut data)?;
        self.save(account, &data).await?;
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn list_collections(&self, account: &AccountId) -> StoreResult<Vec<Collection>> {
        Ok(self.load(account).await?.collections())
    }

    async fn create_collection(&self, account: &AccountId, name: &str) -> StoreResult<Collection> {
        self.update(account, |data| data.create_collection(name)).await
    }

    async fn commit_batch(&self, account: &AccountId, batch: WriteBatch) -> StoreResult<()> {
        debug!(account = %account, bucket = batch.bucket(), records = batch.len(), "committing batch");
        self.update(account, |data| data.apply(batch)).await
    }

    async fn count_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<u64> {
        self.load(account).await?.count_cards(collection)
    }

    async fn set_card_count(
        &self,
        account: &AccountId,
        collection: &CollectionId,
        count: u64,
    ) -> StoreResult<()> {
        self.update(account, |data| data.set_card_count(collection, count)).await
    }

    async fn list_cards(&self, account: &AccountId, collection: &CollectionId) -> StoreResult<Vec<Card>> {
        self.load(account).await?.list_cards(collection)
    }

    async fn list_sold(&self, account: &AccountId, limit: usize) -> StoreResult<Vec<SoldItem>> {
        Ok(self.load(account).await?.list_sold(limit))
    }

    async fn get_profile(&self, account: &AccountId) -> StoreResult<Option<Profile>> {
        Ok(self.load(account).await?.profile())
    }

    async fn put_profile(&self, account: &AccountId, profile: Profile) -> StoreResult<()> {
        self.update(account, |data| {
            data.put_profile(profile);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl BlobStorage for LocalStore {
    async fn upload(&self, key: &BlobKey, content: &[u8], content_type: &str) -> StoreResult<BlobRef> {
        let path = self.blob_path(key);
        debug!("Writing blob {} ({} bytes)", key, content.len());
        fs::write(&path, content).await?;
        let mut type_path = path.into_os_string();
        type_path.push(CONTENT_TYPE_SUFFIX);
        fs::write(&type_path, content_type.as_bytes()).await?;
        Ok(BlobRef {
            key: key.clone(),
            content_type: content_type.to_string(),
            size: content.len() as u64,
        })
    }

    async fn download(&self, key: &BlobKey) -> StoreResult<Vec<u8>> {
        match fs::read(self.blob_path(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("blob {key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobRef>> {
        let mut blobs = Vec::new();
        let mut read_dir = fs::read_dir(self.root.join(BLOBS_DIR)).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.ends_with(CONTENT_TYPE_SUFFIX) {
                continue;
            }
            let key = match hex::decode(&file_name).ok().and_then(|raw| String::from_utf8(raw).ok()) {
                Some(key) => key,
                None => {
                    warn!("Skipping unrecognized blob file {:?}", file_name);
                    continue;
                }
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata().await?;
            let type_path = entry.path().with_file_name(format!("{file_name}{CONTENT_TYPE_SUFFIX}"));
            let content_type = fs::read_to_string(&type_path)
                .await
                .unwrap_or_else(|_| "application/octet-stream".to_string());
            blobs.push(BlobRef {
                key: BlobKey::from_raw(key),
                content_type,
                size: metadata.len(),
            });
        }

        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(blobs)
    }
}
