//! Batch Writer (C3): buffers normalized records and flushes them to the
//! store in transactional batches, with retry on transient connection
//! failures and a pacing delay between flushes.

use std::time::Duration;

use abr_domain::{NormalizedBusiness, RawBusinessName};
use abr_persistence::repository::{
    bulk_insert_names_with, bulk_upsert_with, delete_names_for_business_ids_with, get_ids_by_abns_with,
};
use abr_persistence::{StorageError, StorageResult};
use deadpool_postgres::Pool;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct BatchWriterConfig {
    pub batch_size: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub flush_delay_ms: u64,
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 5_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            flush_delay_ms: 200,
        }
    }
}

/// Running totals returned by [`BatchWriter::destroy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterTotals {
    pub total_inserted: u64,
    pub total_updated: u64,
}

/// Owns the private ingestion-plane pool and the in-memory buffer. Not
/// `Clone` — a run has exactly one writer, driven by exactly one parser
/// task on its dedicated thread (§4.5).
pub struct BatchWriter {
    pool: Pool,
    config: BatchWriterConfig,
    buffer: Vec<NormalizedBusiness>,
    flush_lock: Mutex<()>,
    totals: WriterTotals,
}

impl BatchWriter {
    pub fn new(pool: Pool, config: BatchWriterConfig) -> Self {
        Self {
            pool,
            config,
            buffer: Vec::new(),
            flush_lock: Mutex::new(()),
            totals: WriterTotals::default(),
        }
    }

    /// §4.3.1 `add`. Appends a normalized record (its `other_names` travel
    /// with it and are split out from the `businesses` upsert during flush)
    /// and flushes once the buffer reaches `batch_size`.
    pub async fn add(&mut self, business: NormalizedBusiness) -> StorageResult<()> {
        self.buffer.push(business);
        if self.buffer.len() >= self.config.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// §4.3.1 `flush`. Drains the buffer and runs the batch behind the
    /// flush mutex; a no-op if the buffer is empty.
    pub async fn flush(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.buffer);
        let _guard = self.flush_lock.lock().await;
        let outcome = self.run_batch_with_retry(&batch).await?;
        self.totals.total_inserted += outcome.inserted;
        self.totals.total_updated += outcome.updated;

        if self.config.flush_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.flush_delay_ms)).await;
        }

        Ok(())
    }

    /// §4.3.1 `destroy`. Awaits any in-flight flush, then reports totals.
    /// The pool itself is closed by being dropped along with `self`.
    pub async fn destroy(mut self) -> StorageResult<WriterTotals> {
        self.flush().await?;
        Ok(self.totals)
    }

    async fn run_batch_with_retry(
        &self,
        batch: &[NormalizedBusiness],
    ) -> StorageResult<abr_persistence::UpsertOutcome> {
        let mut attempt = 1;
        loop {
            match self.run_batch(batch).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if attempt <= self.config.retry_attempts && is_retryable(&err) => {
                    let delay = self.config.retry_delay_ms * (1u64 << (attempt - 1));
                    warn!(attempt, delay_ms = delay, error = %err, "retrying batch after transient failure");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// §4.3.2: one transaction per batch, all-or-nothing.
    async fn run_batch(
        &self,
        batch: &[NormalizedBusiness],
    ) -> StorageResult<abr_persistence::UpsertOutcome> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await.map_err(abr_persistence::classify)?;

        let outcome = bulk_upsert_with(&txn, batch).await?;

        let abns: Vec<String> = batch.iter().map(|r| r.abn.clone()).collect();
        let ids_by_abn = get_ids_by_abns_with(&txn, &abns).await?;

        let mut name_rows: Vec<(i64, RawBusinessName)> = Vec::new();
        for business in batch {
            let Some(&id) = ids_by_abn.get(&business.abn) else {
                debug!(abn = %business.abn, "skipping names for unresolved abn");
                continue;
            };
            for name in &business.other_names {
                name_rows.push((id, name.clone()));
            }
        }

        if !name_rows.is_empty() {
            let business_ids: Vec<i64> = ids_by_abn.values().copied().collect();
            delete_names_for_business_ids_with(&txn, &business_ids).await?;
            bulk_insert_names_with(&txn, &name_rows).await?;
        }

        txn.commit().await.map_err(abr_persistence::classify)?;
        Ok(outcome)
    }
}

fn is_retryable(err: &StorageError) -> bool {
    matches!(err, StorageError::Transient(_))
        || matches!(err, StorageError::Pool(pool_err) if abr_persistence::retry::pool_error_is_transient(pool_err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = BatchWriterConfig::default();
        assert_eq!(config.batch_size, 5_000);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay_ms, 1_000);
        assert_eq!(config.flush_delay_ms, 200);
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let base = 1_000u64;
        let delays: Vec<u64> = (1..=3).map(|attempt| base * (1u64 << (attempt - 1))).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000]);
    }
}
