mod common;

use std::sync::Arc;

use cardvault_migrate::{AssetEntry, AssetImporter, AssetOutcome, MigrationConfig, Migrator};
use cardvault_store::{BlobKey, BlobStorage, DocumentStore, MemoryBlobStorage, MemoryStore};
use common::{FlakyBlobs, account, bundle};
use pretty_assertions::assert_eq;
use serde_json::json;

fn entry(path: &str, content: &[u8]) -> AssetEntry {
    AssetEntry {
        path: path.to_string(),
        content: content.to_vec(),
    }
}

#[tokio::test]
async fn uploads_under_card_keys() {
    let blobs = MemoryBlobStorage::new();
    let account = account();

    let outcome = AssetImporter::new(&blobs, &account, 4)
        .import(vec![
            entry("images/ABC123.jpg", b"jpeg"),
            entry("images/XYZ999.png", b"png"),
            entry("images/.jpg", b"nameless"),
        ])
        .await;

    assert_eq!(
        outcome,
        AssetOutcome {
            uploaded: 2,
            failed: 0,
            skipped: 1
        }
    );
    let key = BlobKey::card_image(&account, "ABC123");
    assert_eq!(blobs.download(&key).await.unwrap(), b"jpeg".to_vec());
    let listed = blobs.list(&BlobKey::card_images_prefix(&account)).await.unwrap();
    let types: Vec<_> = listed.iter().map(|b| b.content_type.as_str()).collect();
    assert_eq!(types, vec!["image/jpeg", "image/png"]);
}

#[tokio::test]
async fn one_failed_upload_leaves_the_others() {
    let blobs = FlakyBlobs::failing(&["ABC123"]);
    let account = account();

    let entries = (0..20)
        .map(|i| entry(&format!("images/card-{i}.jpg"), b"x"))
        .chain(std::iter::once(entry("images/ABC123.jpg", b"x")))
        .collect();
    let outcome = AssetImporter::new(&blobs, &account, 3).import(entries).await;

    assert_eq!(outcome.uploaded, 20);
    assert_eq!(outcome.failed, 1);
    assert_eq!(blobs.inner.len().await, 20);
}

#[tokio::test]
async fn failed_image_does_not_affect_cards() {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(FlakyBlobs::failing(&["ABC123"]));
    let migrator = Migrator::new(
        store.clone(),
        blobs.clone(),
        account(),
        MigrationConfig::default(),
    )
    .unwrap();

    let collections = json!({
        "collections": [{
            "name": "Base Set",
            "cards": [{"id": "ABC123", "name": "Charizard"}, {"id": "XYZ999", "name": "Blastoise"}]
        }]
    })
    .to_string();
    let file = bundle(&[
        ("data/collections.json", collections.as_bytes()),
        ("images/ABC123.jpg", b"broken"),
        ("images/XYZ999.jpg", b"fine"),
    ]);

    let result = migrator.import_file("backup.zip", &file).await.unwrap();

    assert_eq!(result.imported_count, 2);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.stats.assets.uploaded, 1);
    assert_eq!(result.stats.assets.failed, 1);

    let uploaded = blobs
        .download(&BlobKey::card_image(&account(), "XYZ999"))
        .await
        .unwrap();
    assert_eq!(uploaded, b"fine".to_vec());

    let collection = &store.list_collections(&account()).await.unwrap()[0];
    assert_eq!(collection.card_count, 2);
}
