//! Batched record writes.
//!
//! Records are split into consecutive fixed-size batches and committed one
//! after another. A failed batch counts all of its records as errors and
//! the writer moves on to the next batch.

use cardvault_store::{DocumentStore, StoreResult, WriteBatch};
use cardvault_types::{AccountId, Card, CollectionId, Fields, SoldItem};
use tracing::{debug, error, warn};

use crate::config::RetryPolicy;
use crate::stats::WriteOutcome;

pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    account: &'a AccountId,
    batch_size: usize,
    retry: &'a RetryPolicy,
}

impl<'a> BatchWriter<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        account: &'a AccountId,
        batch_size: usize,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            store,
            account,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Tags source cards with their destination collection and writes them.
    pub async fn write_into_collection(
        &self,
        cards: Vec<Fields>,
        collection: &CollectionId,
    ) -> WriteOutcome {
        let cards = cards
            .into_iter()
            .map(|fields| Card::from_fields(fields, collection.clone()))
            .collect();
        self.write_cards(cards).await
    }

    pub async fn write_cards(&self, cards: Vec<Card>) -> WriteOutcome {
        self.write_all(cards, WriteBatch::Cards).await
    }

    pub async fn write_sold(&self, items: Vec<SoldItem>) -> WriteOutcome {
        self.write_all(items, WriteBatch::Sold).await
    }

    async fn write_all<T: Clone>(&self, records: Vec<T>, wrap: fn(Vec<T>) -> WriteBatch) -> WriteOutcome {
        let total = records.len().div_ceil(self.batch_size);
        let mut outcome = WriteOutcome::default();

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            let batch = wrap(chunk.to_vec());
            let bucket = batch.bucket();
            let size = batch.len();

            let result = match self.commit(batch, index).await {
                Ok(()) => {
                    debug!(bucket, batch = index + 1, total, records = size, "batch committed");
                    WriteOutcome::committed(size)
                }
                Err(e) => {
                    error!(
                        account = %self.account,
                        bucket,
                        batch = index + 1,
                        total,
                        records = size,
                        error = %e,
                        "batch write failed"
                    );
                    WriteOutcome::batch_failed(size)
                }
            };
            outcome = outcome.merge(result);
        }

        outcome
    }

    /// Commits one batch, retrying transient failures per the retry policy.
    async fn commit(&self, batch: WriteBatch, index: usize) -> StoreResult<()> {
        let mut attempt = 1;
        loop {
            match self.store.commit_batch(self.account, batch.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt, e.retry_after());
                    warn!(
                        batch = index + 1,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient batch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
