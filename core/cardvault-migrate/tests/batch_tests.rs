mod common;

use cardvault_migrate::{BatchWriter, RetryPolicy, WriteOutcome};
use cardvault_store::{DocumentStore, MemoryStore};
use cardvault_types::{CollectionId, Fields, SoldItem};
use common::{FlakyStore, account};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn cards(n: usize) -> Vec<Fields> {
    (0..n)
        .map(|i| {
            let mut fields = Fields::new();
            fields.insert("id".into(), json!(format!("card-{i}")));
            fields.insert("name".into(), json!(format!("Card #{i}")));
            fields
        })
        .collect()
}

#[tokio::test]
async fn splits_into_consecutive_batches() {
    let store = FlakyStore::new();
    let account = account();
    let target = store.create_collection(&account, "Base Set").await.unwrap();
    let retry = RetryPolicy::none();

    let outcome = BatchWriter::new(&store, &account, 500, &retry)
        .write_into_collection(cards(1200), &target.id)
        .await;

    assert_eq!(
        outcome,
        WriteOutcome {
            written: 1200,
            failed: 0,
            batches: 3
        }
    );
    assert_eq!(*store.batch_sizes.lock().unwrap(), vec![500, 500, 200]);
    assert_eq!(store.count_cards(&account, &target.id).await.unwrap(), 1200);
}

#[tokio::test]
async fn failed_batch_does_not_stop_the_rest() {
    let store = FlakyStore::failing_commits(&[3]);
    let account = account();
    let target = store.create_collection(&account, "Jungle").await.unwrap();
    let retry = RetryPolicy::none();

    let outcome = BatchWriter::new(&store, &account, 10, &retry)
        .write_into_collection(cards(100), &target.id)
        .await;

    assert_eq!(outcome.written, 90);
    assert_eq!(outcome.failed, 10);
    assert_eq!(outcome.batches, 10);
    assert_eq!(store.count_cards(&account, &target.id).await.unwrap(), 90);
}

#[tokio::test]
async fn oversized_batch_hits_the_store_quota() {
    let store = MemoryStore::with_max_batch_writes(100);
    let account = account();
    let target = store.create_collection(&account, "Fossil").await.unwrap();
    let retry = RetryPolicy::default();

    let outcome = BatchWriter::new(&store, &account, 150, &retry)
        .write_into_collection(cards(300), &target.id)
        .await;

    // Quota errors are not retried.
    assert_eq!(outcome.failed, 300);
    assert_eq!(outcome.written, 0);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_batch_is_retried() {
    let store = FlakyStore::new();
    store.rate_limited.store(2, std::sync::atomic::Ordering::SeqCst);
    let account = account();
    let target = store.create_collection(&account, "Team Rocket").await.unwrap();
    let retry = RetryPolicy::default();

    let outcome = BatchWriter::new(&store, &account, 50, &retry)
        .write_into_collection(cards(50), &target.id)
        .await;

    assert_eq!(outcome, WriteOutcome::committed(50));
    assert_eq!(store.commit_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_give_up_after_max_attempts() {
    let store = FlakyStore::new();
    store.rate_limited.store(10, std::sync::atomic::Ordering::SeqCst);
    let account = account();
    let retry = RetryPolicy::default();

    let sold: Vec<SoldItem> = cards(5).into_iter().map(SoldItem::from_fields).collect();
    let outcome = BatchWriter::new(&store, &account, 5, &retry).write_sold(sold).await;

    assert_eq!(outcome, WriteOutcome::batch_failed(5));
    assert_eq!(store.commit_calls(), retry.max_attempts as usize);
}

#[tokio::test]
async fn cards_for_a_missing_collection_fail() {
    let store = MemoryStore::new();
    let account = account();
    let retry = RetryPolicy::none();
    let ghost = CollectionId::new();

    let outcome = BatchWriter::new(&store, &account, 10, &retry)
        .write_into_collection(cards(3), &ghost)
        .await;

    assert_eq!(outcome, WriteOutcome::batch_failed(3));
}

proptest! {
    #[test]
    fn batches_cover_every_record_once(records in 0usize..1200, batch_size in 1usize..=500) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (outcome, sizes) = runtime.block_on(async {
            let store = FlakyStore::new();
            let account = account();
            let target = store.create_collection(&account, "Prop").await.unwrap();
            let retry = RetryPolicy::none();
            let outcome = BatchWriter::new(&store, &account, batch_size, &retry)
                .write_into_collection(cards(records), &target.id)
                .await;
            let sizes = store.batch_sizes.lock().unwrap().clone();
            (outcome, sizes)
        });

        prop_assert_eq!(outcome.written, records);
        prop_assert_eq!(outcome.batches, records.div_ceil(batch_size));
        prop_assert_eq!(sizes.iter().sum::<usize>(), records);
        prop_assert!(sizes.iter().all(|&s| s <= batch_size && s > 0));
        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|&s| s == batch_size));
            prop_assert!(*last <= batch_size);
        }
    }
}
