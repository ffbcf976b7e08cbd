//! Single-threaded producer: reader → normalizer → filter → batcher → queue

use super::batcher::Batcher;
use super::dispatcher::BatchSender;
use super::filter::AdmissionFilter;
use crate::error::{IngestError, IngestResult};
use crate::progress::{ProgressTracker, RowOutcome};
use crate::records::Record;
use crate::source::{ColumnMap, ReadOutcome, SourceReader};
use std::io::Read;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Totals produced by one pass over the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Rows read past the header
    pub rows: u64,
    /// Batches handed to the dispatcher
    pub batches: u64,
}

/// Stream every row of `reader` into `sender`, then close the queue.
///
/// Runs on a blocking thread; pushes block on `runtime` while the queue is
/// full. Row-level failures are counted and logged; the stream continues.
///
/// # Errors
///
/// Returns `Cancelled` if `cancel` fires, or the underlying error if the
/// source becomes unreadable or the queue is closed early.
#[allow(clippy::too_many_arguments)]
pub fn produce<R, I>(
    reader: SourceReader<I>,
    columns: &ColumnMap,
    filter: &dyn AdmissionFilter<R>,
    batch_size: usize,
    sender: BatchSender<R>,
    tracker: &ProgressTracker,
    runtime: &Handle,
    cancel: &CancellationToken,
) -> IngestResult<ProducerReport>
where
    R: Record,
    I: Read,
{
    let kind = R::KIND;
    let mut batcher = Batcher::new(batch_size);
    let mut report = ProducerReport::default();

    for item in reader {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled { kind });
        }
        report.rows += 1;

        let row = match item? {
            ReadOutcome::Row(row) => row,
            ReadOutcome::Rejected { line, error } => {
                tracker.record_row(RowOutcome::Malformed);
                warn!(%kind, line, "row rejected: {error}");
                continue;
            }
        };

        let record = match R::normalize(&row, columns) {
            Ok(record) => record,
            Err(error) => {
                tracker.record_row(RowOutcome::Malformed);
                warn!(%kind, line = row.line, "row rejected: {error}");
                continue;
            }
        };

        if !filter.admit(&record) {
            tracker.record_row(RowOutcome::Filtered);
            continue;
        }

        tracker.record_row(RowOutcome::Admitted);
        if let Some(batch) = batcher.push(record) {
            debug!(%kind, batch = batch.seq, rows = batch.len(), queued = sender.depth(), "batch sealed");
            runtime.block_on(sender.push(batch))?;
        }
    }

    if let Some(batch) = batcher.finish() {
        debug!(%kind, batch = batch.seq, rows = batch.len(), "final batch sealed");
        runtime.block_on(sender.push(batch))?;
    }
    sender.close();

    report.batches = batcher.sealed();
    debug!(
        %kind,
        rows = report.rows,
        batches = report.batches,
        filter = filter.name(),
        "source exhausted"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dispatcher;
    use crate::pipeline::filter::DropThresholdFilter;
    use crate::records::BalanceRecord;
    use std::io::Cursor;
    use std::sync::Arc;
    use uuid::Uuid;

    const CSV: &str = "\
Laporan DI319
periode,cif,branch,norek,balance,avg_balance
2024-06-30,C1,U1,A1,400,1000
2024-06-30,C2,U1,A2,900,1000
30-06-2024,C3,U1,A3,1,1000
2024-06-30,C4,U1,A4,100,
2024-06-30,C5,U1,A5,500,1000
";

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rows_are_classified_and_batched() -> IngestResult<()> {
        let reader = SourceReader::detect(
            Cursor::new(CSV.as_bytes().to_vec()),
            10,
            BalanceRecord::header_probes(),
        )?;
        let columns = BalanceRecord::aliases().resolve(&reader.header().cells);
        let tracker = Arc::new(ProgressTracker::new(BalanceRecord::KIND));
        tracker.try_begin(Uuid::new_v4())?;

        let cancel = CancellationToken::new();
        let (tx, rx) = dispatcher::channel::<BalanceRecord>(BalanceRecord::KIND, 4, cancel.clone());
        let runtime = Handle::current();
        let producer_tracker = Arc::clone(&tracker);
        let report = tokio::task::spawn_blocking(move || {
            produce(
                reader,
                &columns,
                &DropThresholdFilter::default(),
                1,
                tx,
                &producer_tracker,
                &runtime,
                &cancel,
            )
        })
        .await
        .map_err(|e| IngestError::internal(e.to_string()))??;

        assert_eq!(report, ProducerReport { rows: 5, batches: 2 });
        let counters = tracker.counters();
        assert_eq!(counters.total_rows, 5);
        assert_eq!(counters.admitted_rows, 2);
        assert_eq!(counters.filtered_rows, 2);
        assert_eq!(counters.malformed_rows, 1);

        let mut cifs = Vec::new();
        while let Some(batch) = rx.pop().await {
            cifs.extend(batch.records().iter().map(|r| r.cif.clone()));
        }
        assert_eq!(cifs, vec!["C1", "C5"]);
        Ok(())
    }
}
