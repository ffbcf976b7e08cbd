//! Persistence workers

use super::dispatcher::BatchReceiver;
use crate::progress::ProgressTracker;
use crate::records::Record;
use crate::storage::DynStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// What one worker did before the queue closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker index
    pub worker: usize,
    /// Batches committed
    pub committed_batches: u64,
    /// Batches the store rejected
    pub failed_batches: u64,
}

/// Long-lived consumer that persists one batch at a time
pub struct PersistenceWorker<R: Record> {
    id: usize,
    store: DynStore<R>,
    tracker: Arc<ProgressTracker>,
    receiver: BatchReceiver<R>,
}

impl<R: Record> PersistenceWorker<R> {
    /// Create a worker
    #[must_use]
    pub fn new(
        id: usize,
        store: DynStore<R>,
        tracker: Arc<ProgressTracker>,
        receiver: BatchReceiver<R>,
    ) -> Self {
        Self {
            id,
            store,
            tracker,
            receiver,
        }
    }

    /// Drain the queue until it is closed or the job is cancelled.
    ///
    /// A batch the store rejects is counted as failed in full; there is no
    /// row-level retry.
    pub async fn run(self) -> WorkerReport {
        let mut report = WorkerReport {
            worker: self.id,
            ..WorkerReport::default()
        };

        while let Some(batch) = self.receiver.pop().await {
            let rows = batch.len() as u64;
            let start = Instant::now();
            match self.store.batch_insert(batch.records()).await {
                Ok(_) => {
                    self.tracker.record_persisted(rows);
                    report.committed_batches += 1;
                    debug!(
                        worker = self.id,
                        batch = batch.seq,
                        rows,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "batch committed"
                    );
                }
                Err(e) => {
                    self.tracker.record_batch_failure(rows);
                    report.failed_batches += 1;
                    error!(
                        worker = self.id,
                        batch = batch.seq,
                        rows,
                        backend = self.store.backend(),
                        code = e.code().as_u16(),
                        "batch insert failed: {e}"
                    );
                }
            }
        }

        debug!(
            worker = self.id,
            committed = report.committed_batches,
            failed = report.failed_batches,
            "worker finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestError, IngestResult};
    use crate::pipeline::batcher::Batcher;
    use crate::pipeline::dispatcher;
    use crate::progress::RowOutcome;
    use crate::records::PipelineRecord;
    use crate::storage::{RecordStore, StoredRecord};
    use crate::types::{JobKind, Pagination, RecordFilter, SortOrder};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use mockall::mock;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    mock! {
        Store {}

        #[async_trait]
        impl RecordStore<PipelineRecord> for Store {
            async fn batch_insert(&self, records: &[PipelineRecord]) -> IngestResult<u64>;
            async fn count(&self, filter: &RecordFilter) -> IngestResult<u64>;
            async fn query(
                &self,
                filter: &RecordFilter,
                page: &Pagination,
                order: SortOrder,
            ) -> IngestResult<Vec<StoredRecord<PipelineRecord>>>;
            fn backend(&self) -> &'static str;
        }
    }

    fn record(pn: &str) -> PipelineRecord {
        PipelineRecord {
            pn: pn.to_string(),
            rm_name: "N/A".to_string(),
            branch_code: "N/A".to_string(),
            branch_office: "N/A".to_string(),
            product: "N/A".to_string(),
            account_number: "0012".to_string(),
            duplicate_flag: "N/A".to_string(),
            customer_name: "N/A".to_string(),
            entry_date: NaiveDate::MIN,
            strategy: "N/A".to_string(),
            segment: "N/A".to_string(),
            pipeline_stage: "N/A".to_string(),
            projection: None,
        }
    }

    fn tracker_with_rows(rows: u64) -> IngestResult<Arc<ProgressTracker>> {
        let tracker = Arc::new(ProgressTracker::new(JobKind::Pipeline));
        tracker.try_begin(Uuid::new_v4())?;
        for _ in 0..rows {
            tracker.record_row(RowOutcome::Admitted);
        }
        Ok(tracker)
    }

    #[tokio::test]
    async fn test_failed_batch_counts_every_row() -> IngestResult<()> {
        let mut store = MockStore::new();
        store
            .expect_batch_insert()
            .times(2)
            .returning(|records| {
                if records.iter().any(|r| r.pn == "bad") {
                    Err(IngestError::storage("batch_insert", "constraint violated"))
                } else {
                    Ok(records.len() as u64)
                }
            });
        store.expect_backend().return_const("mock");

        let tracker = tracker_with_rows(5)?;
        let (tx, rx) = dispatcher::channel(JobKind::Pipeline, 4, CancellationToken::new());
        let mut batcher = Batcher::new(3);
        for pn in ["a", "b", "c", "d", "bad"] {
            if let Some(batch) = batcher.push(record(pn)) {
                tx.push(batch).await?;
            }
        }
        if let Some(batch) = batcher.finish() {
            tx.push(batch).await?;
        }
        tx.close();

        let store: DynStore<PipelineRecord> = Arc::new(store);
        let report = PersistenceWorker::new(0, store, Arc::clone(&tracker), rx)
            .run()
            .await;

        assert_eq!(report.committed_batches, 1);
        assert_eq!(report.failed_batches, 1);
        let counters = tracker.counters();
        assert_eq!(counters.persisted_rows, 3);
        assert_eq!(counters.failed_batch_rows, 2);
        assert_eq!(
            counters.persisted_rows + counters.failed_batch_rows,
            counters.admitted_rows
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_pool_drains_queue_concurrently() -> IngestResult<()> {
        let mut store = MockStore::new();
        store
            .expect_batch_insert()
            .times(10)
            .returning(|records| Ok(records.len() as u64));
        store.expect_backend().return_const("mock");
        let store: DynStore<PipelineRecord> = Arc::new(store);

        let tracker = tracker_with_rows(20)?;
        let (tx, rx) = dispatcher::channel(JobKind::Pipeline, 2, CancellationToken::new());
        let workers: Vec<_> = (0..3)
            .map(|id| {
                tokio::spawn(
                    PersistenceWorker::new(id, Arc::clone(&store), Arc::clone(&tracker), rx.clone())
                        .run(),
                )
            })
            .collect();
        drop(rx);

        let mut batcher = Batcher::new(2);
        for i in 0..20 {
            if let Some(batch) = batcher.push(record(&i.to_string())) {
                tx.push(batch).await?;
            }
        }
        tx.close();

        let mut committed = 0;
        for worker in futures::future::join_all(workers).await {
            committed += worker
                .map_err(|e| IngestError::internal(e.to_string()))?
                .committed_batches;
        }
        assert_eq!(committed, 10);
        assert_eq!(tracker.counters().persisted_rows, 20);
        Ok(())
    }
}
