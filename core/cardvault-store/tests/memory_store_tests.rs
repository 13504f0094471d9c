use cardvault_store::{
    BlobKey, BlobStorage, DocumentStore, MemoryBlobStorage, MemoryStore, StoreError, WriteBatch,
};
use cardvault_types::{AccountId, Card, CollectionId, Fields, Profile, SoldItem};
use pretty_assertions::assert_eq;
use serde_json::json;

fn account() -> AccountId {
    AccountId::parse("collector").unwrap()
}

fn card(id: &str, collection: &CollectionId) -> Card {
    let mut fields = Fields::new();
    fields.insert("id".into(), json!(id));
    fields.insert("name".into(), json!(format!("Card {id}")));
    Card::from_fields(fields, collection.clone())
}

fn sold(id: &str) -> SoldItem {
    let mut fields = Fields::new();
    fields.insert("id".into(), json!(id));
    SoldItem::from_fields(fields)
}

// ── Collections ─────────────────────────────────────────────────

#[tokio::test]
async fn create_and_list_collections() {
    let store = MemoryStore::new();
    let created = store.create_collection(&account(), "Base Set").await.unwrap();
    let listed = store.list_collections(&account()).await.unwrap();
    assert_eq!(listed, vec![created]);
}

#[tokio::test]
async fn duplicate_collection_name_rejected() {
    let store = MemoryStore::new();
    store.create_collection(&account(), "Base Set").await.unwrap();
    let err = store.create_collection(&account(), "base set").await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn accounts_are_isolated() {
    let store = MemoryStore::new();
    store.create_collection(&account(), "Base Set").await.unwrap();
    let other = AccountId::parse("someone-else").unwrap();
    assert!(store.list_collections(&other).await.unwrap().is_empty());
}

// ── Batches ─────────────────────────────────────────────────────

#[tokio::test]
async fn commit_and_count_cards() {
    let store = MemoryStore::new();
    let c = store.create_collection(&account(), "Jungle").await.unwrap();
    store
        .commit_batch(&account(), WriteBatch::Cards(vec![card("a", &c.id), card("b", &c.id)]))
        .await
        .unwrap();

    assert_eq!(store.count_cards(&account(), &c.id).await.unwrap(), 2);
    let ids: Vec<String> = store
        .list_cards(&account(), &c.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn cards_upsert_by_id() {
    let store = MemoryStore::new();
    let c1 = store.create_collection(&account(), "One").await.unwrap();
    let c2 = store.create_collection(&account(), "Two").await.unwrap();
    store.commit_batch(&account(), WriteBatch::Cards(vec![card("a", &c1.id)])).await.unwrap();
    store.commit_batch(&account(), WriteBatch::Cards(vec![card("a", &c2.id)])).await.unwrap();

    assert_eq!(store.count_cards(&account(), &c1.id).await.unwrap(), 0);
    assert_eq!(store.count_cards(&account(), &c2.id).await.unwrap(), 1);
}

#[tokio::test]
async fn batch_over_quota_rejected() {
    let store = MemoryStore::with_max_batch_writes(2);
    let c = store.create_collection(&account(), "Fossil").await.unwrap();
    let cards = vec![card("a", &c.id), card("b", &c.id), card("c", &c.id)];
    let err = store.commit_batch(&account(), WriteBatch::Cards(cards)).await.unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { attempted: 3, limit: 2 }));
    assert_eq!(store.count_cards(&account(), &c.id).await.unwrap(), 0);
}

#[tokio::test]
async fn orphan_card_rejects_whole_batch() {
    let store = MemoryStore::new();
    let c = store.create_collection(&account(), "Rocket").await.unwrap();
    let missing = CollectionId::from("missing");
    let err = store
        .commit_batch(&account(), WriteBatch::Cards(vec![card("a", &c.id), card("b", &missing)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
    assert_eq!(store.count_cards(&account(), &c.id).await.unwrap(), 0);
}

#[tokio::test]
async fn set_card_count_persists() {
    let store = MemoryStore::new();
    let c = store.create_collection(&account(), "Gym").await.unwrap();
    store.set_card_count(&account(), &c.id, 12).await.unwrap();
    let listed = store.list_collections(&account()).await.unwrap();
    assert_eq!(listed[0].card_count, 12);

    let err = store
        .set_card_count(&account(), &CollectionId::from("nope"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn sold_items_most_recent_first() {
    let store = MemoryStore::new();
    store
        .commit_batch(&account(), WriteBatch::Sold(vec![sold("s1"), sold("s2"), sold("s3")]))
        .await
        .unwrap();
    let ids: Vec<String> = store
        .list_sold(&account(), 2)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["s3".to_string(), "s2".to_string()]);
}

// ── Profile ─────────────────────────────────────────────────────

#[tokio::test]
async fn profile_is_replaced_whole() {
    let store = MemoryStore::new();
    assert!(store.get_profile(&account()).await.unwrap().is_none());

    let first = Profile::from_value(json!({"displayName": "Ash", "bio": "gotta catch"})).unwrap();
    let second = Profile::from_value(json!({"displayName": "Misty"})).unwrap();
    store.put_profile(&account(), first).await.unwrap();
    store.put_profile(&account(), second.clone()).await.unwrap();

    assert_eq!(store.get_profile(&account()).await.unwrap(), Some(second));
}

// ── Blobs ───────────────────────────────────────────────────────

#[tokio::test]
async fn blob_upload_download_list() {
    let blobs = MemoryBlobStorage::new();
    let key = BlobKey::card_image(&account(), "ABC123");
    let reference = blobs.upload(&key, b"jpeg bytes", "image/jpeg").await.unwrap();
    assert_eq!(reference.size, 10);

    assert_eq!(blobs.download(&key).await.unwrap(), b"jpeg bytes");
    let listed = blobs.list(&BlobKey::card_images_prefix(&account())).await.unwrap();
    assert_eq!(listed, vec![reference]);
    assert!(blobs.list("other/").await.unwrap().is_empty());
}

#[tokio::test]
async fn blob_download_missing() {
    let blobs = MemoryBlobStorage::new();
    let err = blobs
        .download(&BlobKey::from_raw("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

// ── Error helpers ───────────────────────────────────────────────

#[test]
fn retryable_errors() {
    let limited = StoreError::RateLimited { retry_after_ms: 1500 };
    assert!(limited.is_retryable());
    assert_eq!(limited.retry_after(), Some(std::time::Duration::from_millis(1500)));

    assert!(StoreError::Unavailable("503".into()).is_retryable());
    assert!(!StoreError::Rejected("bad".into()).is_retryable());
    assert!(!StoreError::QuotaExceeded { attempted: 2, limit: 1 }.is_retryable());
    assert_eq!(StoreError::Unavailable("x".into()).retry_after(), None);
}
