//! Job Supervisor
//!
//! Owns one [`ProgressTracker`] per job kind, rejects overlapping jobs of the
//! same kind, and launches the pipeline in the background. The caller gets a
//! [`JobHandle`] back immediately; it can cancel the job or await its report.

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::pipeline::{dispatcher, produce, AdmissionFilter, PersistenceWorker, WorkerReport};
use crate::progress::{spawn_sampler, Counters, ProgressSnapshot, ProgressTracker};
use crate::records::Record;
use crate::source::{ColumnMap, SourceReader};
use crate::storage::DynStore;
use crate::types::JobKind;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Message stored when a job is cancelled
pub const CANCELLED_MESSAGE: &str = "Import cancelled";

/// Final account of a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Job identifier
    pub job_id: Uuid,
    /// Job kind
    pub kind: JobKind,
    /// Final counters
    pub counters: Counters,
    /// Batches sealed by the producer
    pub batches: u64,
    /// Batches committed by the workers
    pub committed_batches: u64,
    /// Batches the store rejected
    pub failed_batches: u64,
    /// Wall time from launch to completion
    pub elapsed: Duration,
    /// Summary message
    pub message: String,
}

/// Handle to a running job
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    kind: JobKind,
    cancel: CancellationToken,
    task: JoinHandle<IngestResult<JobReport>>,
}

impl JobHandle {
    /// Job identifier
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Job kind
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    /// Request cancellation; the producer and workers stop at their next
    /// queue operation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the background task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to end
    ///
    /// # Errors
    ///
    /// Returns the job's error, `Cancelled` if it was cancelled, or an
    /// internal error if the task panicked.
    pub async fn wait(self) -> IngestResult<JobReport> {
        self.task
            .await
            .map_err(|e| IngestError::internal(format!("import task failed: {e}")))?
    }
}

/// Guards job state and launches pipelines
#[derive(Debug)]
pub struct JobSupervisor {
    config: Arc<IngestConfig>,
    trackers: HashMap<JobKind, Arc<ProgressTracker>>,
}

impl JobSupervisor {
    /// Create a supervisor with an idle tracker for every job kind
    #[must_use]
    pub fn new(config: Arc<IngestConfig>) -> Self {
        let trackers = JobKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(ProgressTracker::new(*kind))))
            .collect();
        Self { config, trackers }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Tracker for `kind`
    #[must_use]
    pub fn tracker(&self, kind: JobKind) -> Arc<ProgressTracker> {
        self.trackers
            .get(&kind)
            .map_or_else(|| Arc::new(ProgressTracker::new(kind)), Arc::clone)
    }

    /// Progress snapshot for `kind`
    #[must_use]
    pub fn snapshot(&self, kind: JobKind) -> ProgressSnapshot {
        self.tracker(kind).snapshot()
    }

    /// Start a job for record type `R`.
    ///
    /// The conflict check and the transition to `Processing` happen before
    /// `open` runs. If `open` or header detection fails, the job moves to
    /// `Failed` and the error is returned; otherwise the pipeline is spawned
    /// and a handle returned without waiting for any row.
    ///
    /// # Errors
    ///
    /// Returns `JobConflict` if a job of the same kind is processing, the
    /// error from `open`, `HeaderNotFound`, or an internal error when called
    /// outside a Tokio runtime.
    pub fn start<R, I, F>(
        &self,
        open: F,
        filter: Arc<dyn AdmissionFilter<R>>,
        store: DynStore<R>,
    ) -> IngestResult<JobHandle>
    where
        R: Record,
        I: Read + Send + 'static,
        F: FnOnce() -> IngestResult<I>,
    {
        let kind = R::KIND;
        let runtime = Handle::try_current()
            .map_err(|e| IngestError::internal(format!("no async runtime: {e}")))?;
        let tracker = self.tracker(kind);
        let job_id = Uuid::new_v4();
        tracker.try_begin(job_id)?;

        let reader = match open().and_then(|source| {
            SourceReader::detect(
                source,
                self.config.source.header_scan_lines,
                R::header_probes(),
            )
        }) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(%kind, %job_id, code = e.code().as_u16(), "import rejected: {e}");
                tracker.fail(e.to_string());
                return Err(e);
            }
        };

        let columns = R::aliases().resolve(&reader.header().cells);
        if !columns.unresolved().is_empty() {
            debug!(%kind, missing = ?columns.unresolved(), "header lacks some fields");
        }
        tracker.set_message("Processing...");

        let cancel = CancellationToken::new();
        let job = Job {
            job_id,
            config: Arc::clone(&self.config),
            tracker,
            cancel: cancel.clone(),
            runtime: runtime.clone(),
        };
        let task = runtime.spawn(job.run(reader, columns, filter, store));

        info!(%kind, %job_id, workers = self.config.pipeline.worker_count, "import started");
        Ok(JobHandle {
            job_id,
            kind,
            cancel,
            task,
        })
    }
}

struct Job {
    job_id: Uuid,
    config: Arc<IngestConfig>,
    tracker: Arc<ProgressTracker>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl Job {
    async fn run<R, I>(
        self,
        reader: SourceReader<I>,
        columns: ColumnMap,
        filter: Arc<dyn AdmissionFilter<R>>,
        store: DynStore<R>,
    ) -> IngestResult<JobReport>
    where
        R: Record,
        I: Read + Send + 'static,
    {
        let kind = R::KIND;
        let started = Instant::now();
        let pipeline = &self.config.pipeline;

        let (sender, receiver) =
            dispatcher::channel::<R>(kind, pipeline.queue_capacity, self.cancel.clone());
        let workers: Vec<JoinHandle<WorkerReport>> = (0..pipeline.worker_count)
            .map(|id| {
                let worker = PersistenceWorker::new(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&self.tracker),
                    receiver.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        drop(receiver);

        let sampler_stop = CancellationToken::new();
        let sampler = kind.tracks_throughput().then(|| {
            spawn_sampler(
                Arc::clone(&self.tracker),
                self.config.sample_interval(),
                sampler_stop.clone(),
            )
        });

        let produced = {
            let tracker = Arc::clone(&self.tracker);
            let cancel = self.cancel.clone();
            let runtime = self.runtime.clone();
            let batch_size = pipeline.batch_size;
            tokio::task::spawn_blocking(move || {
                produce(
                    reader,
                    &columns,
                    filter.as_ref(),
                    batch_size,
                    sender,
                    &tracker,
                    &runtime,
                    &cancel,
                )
            })
            .await
            .map_err(|e| IngestError::pipeline("producer", e.to_string()))
            .and_then(|result| result)
        };

        let mut committed_batches = 0;
        let mut failed_batches = 0;
        for joined in futures::future::join_all(workers).await {
            match joined {
                Ok(report) => {
                    committed_batches += report.committed_batches;
                    failed_batches += report.failed_batches;
                }
                Err(e) => error!(%kind, job_id = %self.job_id, "worker task failed: {e}"),
            }
        }

        sampler_stop.cancel();
        if let Some(sampler) = sampler {
            if let Err(e) = sampler.await {
                warn!(%kind, "progress sampler failed: {e}");
            }
        }

        let produced = match produced {
            Ok(_) if self.cancel.is_cancelled() => Err(IngestError::Cancelled { kind }),
            other => other,
        };

        match produced {
            Ok(report) => {
                let counters = self.tracker.counters();
                let message =
                    summary(kind, &counters, self.config.filter.drop_threshold_percent);
                self.tracker.complete(message.clone());
                info!(
                    %kind,
                    job_id = %self.job_id,
                    total = counters.total_rows,
                    persisted = counters.persisted_rows,
                    failed = counters.failed_rows(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "{message}"
                );
                Ok(JobReport {
                    job_id: self.job_id,
                    kind,
                    counters,
                    batches: report.batches,
                    committed_batches,
                    failed_batches,
                    elapsed: started.elapsed(),
                    message,
                })
            }
            Err(e @ IngestError::Cancelled { .. }) => {
                self.tracker.fail(CANCELLED_MESSAGE);
                warn!(%kind, job_id = %self.job_id, "import cancelled");
                Err(e)
            }
            Err(e) => {
                self.tracker.fail(format!("Import failed: {e}"));
                error!(
                    %kind,
                    job_id = %self.job_id,
                    code = e.code().as_u16(),
                    category = e.code().category(),
                    "import failed: {e}"
                );
                Err(e)
            }
        }
    }
}

/// Human-readable completion message
#[allow(clippy::cast_precision_loss)]
fn summary(kind: JobKind, counters: &Counters, threshold_percent: f64) -> String {
    match kind {
        JobKind::Pipeline => format!(
            "Import completed! Imported {} of {} rows ({} failed)",
            counters.persisted_rows,
            counters.total_rows,
            counters.failed_rows()
        ),
        JobKind::Rfmt => format!(
            "Import completed! Imported {} of {} staff records ({} failed)",
            counters.persisted_rows,
            counters.total_rows,
            counters.failed_rows()
        ),
        JobKind::BalanceDrop => {
            let filtered = if counters.total_rows == 0 {
                0.0
            } else {
                counters.persisted_rows as f64 / counters.total_rows as f64 * 100.0
            };
            format!(
                "Import completed! Processed {} records, saved {} records with ≥{}% drop ({:.2}% filtered)",
                counters.total_rows, counters.persisted_rows, threshold_percent, filtered
            )
        }
    }
}
