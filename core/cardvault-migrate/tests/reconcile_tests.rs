mod common;

use std::sync::atomic::Ordering;

use cardvault_migrate::{CollectionReconciler, NormalizedCollection, Resolution};
use cardvault_store::{DocumentStore, MemoryStore};
use common::{FlakyStore, account};
use pretty_assertions::assert_eq;

fn named(id: Option<&str>, name: &str) -> NormalizedCollection {
    NormalizedCollection {
        id: id.map(str::to_string),
        name: name.to_string(),
        cards: Vec::new(),
    }
}

#[tokio::test]
async fn existing_collections_are_reused_by_folded_name() {
    let store = MemoryStore::new();
    let account = account();
    let base = store.create_collection(&account, "Base Set").await.unwrap();

    let reconciler = CollectionReconciler::load(&store, &account).await.unwrap();
    let result = reconciler
        .reconcile(&[named(Some("old-1"), "  base   SET ")])
        .await;

    assert!(result.created.is_empty());
    assert_eq!(result.reused, 1);
    assert_eq!(result.by_old_id.get("old-1"), Some(&base.id));
    assert_eq!(result.resolve("Base Set"), Some(&base.id));
    assert_eq!(store.list_collections(&account).await.unwrap().len(), 1);
}

#[tokio::test]
async fn repeated_names_in_one_import_create_once() {
    let store = MemoryStore::new();
    let account = account();

    let reconciler = CollectionReconciler::load(&store, &account).await.unwrap();
    let result = reconciler
        .reconcile(&[
            named(Some("a"), "Jungle"),
            named(Some("b"), "JUNGLE"),
            named(None, "Fossil"),
        ])
        .await;

    assert_eq!(result.created.len(), 2);
    assert_eq!(result.reused, 0);
    assert_eq!(result.by_old_id.get("a"), result.by_old_id.get("b"));
    assert_eq!(result.by_name.len(), 2);
    assert_eq!(result.by_source_name.len(), 3);
    assert_eq!(result.by_source_name.get("JUNGLE"), result.by_source_name.get("Jungle"));
    assert!(result.by_source_name.contains_key("Fossil"));
    assert_eq!(store.list_collections(&account).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reconciling_twice_is_idempotent() {
    let store = MemoryStore::new();
    let account = account();
    let input = [named(None, "Jungle"), named(None, "Fossil")];

    let first = CollectionReconciler::load(&store, &account)
        .await
        .unwrap()
        .reconcile(&input)
        .await;
    let second = CollectionReconciler::load(&store, &account)
        .await
        .unwrap()
        .reconcile(&input)
        .await;

    assert_eq!(first.created.len(), 2);
    assert!(second.created.is_empty());
    assert_eq!(second.reused, 2);
    assert_eq!(first.by_name, second.by_name);
}

#[tokio::test]
async fn creation_failure_is_recorded_and_not_retried() {
    let store = FlakyStore::failing_create(&["Broken"]);
    let account = account();

    let reconciler = CollectionReconciler::load(&store, &account).await.unwrap();
    let result = reconciler
        .reconcile(&[
            named(None, "Broken"),
            named(None, "Working"),
            named(None, "broken"),
        ])
        .await;

    assert_eq!(result.failed, vec!["Broken".to_string()]);
    assert!(result.resolve("Broken").is_none());
    assert!(result.resolve("Working").is_some());
    // One attempt for "Broken", one for "Working".
    assert_eq!(store.creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn resolve_creates_then_reuses() {
    let store = MemoryStore::new();
    let account = account();
    let mut reconciler = CollectionReconciler::from_existing(&store, &account, &[]);

    let first = reconciler.resolve("Imported Cards").await.unwrap();
    let second = reconciler.resolve("imported cards").await.unwrap();

    assert!(matches!(first, Resolution::Created(_)));
    assert_eq!(second, Resolution::Existing(first.id().clone()));
    assert_eq!(reconciler.lookup("IMPORTED CARDS"), Some(first.id()));
}

#[tokio::test]
async fn listing_failure_is_an_error() {
    let store = FlakyStore {
        fail_list: true,
        ..FlakyStore::default()
    };
    assert!(CollectionReconciler::load(&store, &account()).await.is_err());
}
