//! Batch accumulation and per-batch commits against the storage collaborator

use crate::error::{PersistError, Result};
use crate::types::RegistryRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Storage collaborator used by the import pipeline
///
/// Implementations must apply each call atomically: either every record of
/// the batch is written or none is. Writes are upserts keyed by
/// `registration_number`, so re-importing the same file converges.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert or update every record in one transaction, returning the number written
    async fn upsert_batch(&self, records: &[RegistryRecord]) -> Result<u64>;
}

/// Groups parsed records into fixed-size batches
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    buffer: Vec<RegistryRecord>,
}

impl BatchAccumulator {
    /// Accumulator emitting batches of `batch_size` records (minimum 1)
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    /// Add a record, returning a full batch when one is complete
    pub fn push(&mut self, record: RegistryRecord) -> Option<Vec<RegistryRecord>> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.buffer,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// Records waiting for a full batch
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Hand over the partial final batch, if any
    pub fn finish(self) -> Option<Vec<RegistryRecord>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}

/// Commits batches one at a time, turning storage failures into reports
#[derive(Clone)]
pub struct BatchPersister {
    store: Arc<dyn RegistryStore>,
}

impl BatchPersister {
    /// Persister writing through `store`
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Commit one batch
    ///
    /// A rejected batch leaves nothing behind and is returned as
    /// [`PersistError::BatchFailed`] with its key range; the caller counts it
    /// and moves on. Empty batches are a no-op.
    pub async fn persist(
        &self,
        batch_index: u64,
        records: &[RegistryRecord],
    ) -> std::result::Result<u64, PersistError> {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Ok(0);
        };

        match self.store.upsert_batch(records).await {
            Ok(written) => {
                tracing::debug!(
                    batch = batch_index,
                    size = records.len(),
                    written,
                    "batch committed"
                );
                Ok(written)
            }
            Err(e) => {
                tracing::warn!(
                    batch = batch_index,
                    size = records.len(),
                    first_key = %first.registration_number,
                    last_key = %last.registration_number,
                    error = %e,
                    "batch rejected by store"
                );
                Err(PersistError::BatchFailed {
                    batch: batch_index,
                    size: records.len(),
                    first_key: first.registration_number.clone(),
                    last_key: last.registration_number.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for BatchPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPersister").finish_non_exhaustive()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatabaseError, Error};
    use std::sync::Mutex;

    fn record(rnc: &str) -> RegistryRecord {
        RegistryRecord {
            registration_number: rnc.to_string(),
            legal_name: format!("EMPRESA {rnc}"),
            trade_name: String::new(),
            activity_description: String::new(),
            operations_start_date: None,
            status: "ACTIVO".to_string(),
            payment_regime: None,
        }
    }

    /// Store that records batch sizes and rejects batches containing "BAD"
    #[derive(Default)]
    struct RecordingStore {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RegistryStore for RecordingStore {
        async fn upsert_batch(&self, records: &[RegistryRecord]) -> Result<u64> {
            if records.iter().any(|r| r.registration_number == "BAD") {
                return Err(Error::Database(DatabaseError::QueryFailed(
                    "constraint failed".into(),
                )));
            }
            self.batches.lock().unwrap().push(records.len());
            Ok(records.len() as u64)
        }
    }

    #[test]
    fn accumulator_emits_full_batches_and_remainder() {
        let mut acc = BatchAccumulator::new(2);

        assert!(acc.push(record("1")).is_none());
        let batch = acc.push(record("2")).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(acc.pending(), 0);

        assert!(acc.push(record("3")).is_none());
        let rest = acc.finish().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].registration_number, "3");
    }

    #[test]
    fn accumulator_without_remainder_finishes_empty() {
        let mut acc = BatchAccumulator::new(1);
        assert!(acc.push(record("1")).is_some());
        assert!(acc.finish().is_none());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let mut acc = BatchAccumulator::new(0);
        assert!(acc.push(record("1")).is_some());
    }

    #[tokio::test]
    async fn persist_returns_written_count() {
        let store = Arc::new(RecordingStore::default());
        let persister = BatchPersister::new(store.clone());

        let written = persister
            .persist(0, &[record("1"), record("2")])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(*store.batches.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn rejected_batch_reports_key_range() {
        let persister = BatchPersister::new(Arc::new(RecordingStore::default()));

        let err = persister
            .persist(7, &[record("100"), record("BAD"), record("300")])
            .await
            .unwrap_err();

        let PersistError::BatchFailed {
            batch,
            size,
            first_key,
            last_key,
            reason,
        } = err;
        assert_eq!(batch, 7);
        assert_eq!(size, 3);
        assert_eq!(first_key, "100");
        assert_eq!(last_key, "300");
        assert!(reason.contains("constraint failed"));
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let store = Arc::new(RecordingStore::default());
        let persister = BatchPersister::new(store.clone());

        assert_eq!(persister.persist(0, &[]).await.unwrap(), 0);
        assert!(store.batches.lock().unwrap().is_empty());
    }
}
