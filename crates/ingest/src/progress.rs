//! Progress Tracker
//!
//! One [`ProgressTracker`] per job kind holds the job state behind a single
//! `RwLock`: every stage mutates it under the write lock, polling callers
//! read a consistent [`ProgressSnapshot`] under the read lock.

use crate::error::{IngestError, IngestResult};
use crate::types::{JobKind, JobStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// ETA placeholder while throughput is still zero
pub const ETA_PENDING: &str = "calculating...";

/// Producer-side outcome of one source row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Normalized and admitted to a batch
    Admitted,
    /// Normalized but rejected by the admission filter
    Filtered,
    /// Rejected by the reader or normalizer
    Malformed,
}

/// Monotonic job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Rows read past the header
    pub total_rows: u64,
    /// Rows rejected by the reader or normalizer
    pub malformed_rows: u64,
    /// Rows rejected by the admission filter
    pub filtered_rows: u64,
    /// Rows handed to the batcher
    pub admitted_rows: u64,
    /// Rows in committed batches
    pub persisted_rows: u64,
    /// Rows in batches the store rejected, plus admitted rows abandoned
    /// when the job failed or was cancelled
    pub failed_batch_rows: u64,
}

impl Counters {
    /// Malformed rows plus rows lost in failed batches
    #[must_use]
    pub const fn failed_rows(&self) -> u64 {
        self.malformed_rows + self.failed_batch_rows
    }
}

#[derive(Debug, Default)]
struct JobState {
    job_id: Option<Uuid>,
    status: JobStatus,
    counters: Counters,
    message: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    speed: Option<f64>,
    elapsed_time: Option<String>,
    estimated_time: Option<String>,
    filter_percentage: Option<f64>,
}

/// Point-in-time copy of a job's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Job identifier, absent before the first job
    pub job_id: Option<Uuid>,
    /// Job kind
    pub kind: JobKind,
    /// Lifecycle state
    pub status: JobStatus,
    /// Rows read past the header
    pub total_rows: u64,
    /// Rows admitted to batches
    pub admitted_rows: u64,
    /// Rows persisted
    pub imported_rows: u64,
    /// Malformed rows plus rows lost in failed batches
    pub failed_rows: u64,
    /// Rows rejected by the admission filter
    pub filtered_rows: u64,
    /// Persisted share of rows read, in percent
    pub progress: f64,
    /// Human-readable status
    pub message: String,
    /// Rows persisted per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Elapsed wall time, e.g. `"12.5s"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<String>,
    /// Remaining time estimate, or `"calculating..."`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    /// Persisted share of rows read once the job completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_percentage: Option<f64>,
    /// Start timestamp
    pub started_at: Option<DateTime<Utc>>,
    /// End timestamp
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job-scoped progress state for one job kind
#[derive(Debug)]
pub struct ProgressTracker {
    kind: JobKind,
    state: RwLock<JobState>,
}

impl ProgressTracker {
    /// Create an idle tracker
    #[must_use]
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            state: RwLock::new(JobState::default()),
        }
    }

    /// Job kind this tracker serves
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    /// Move to `Processing` with fresh counters, unless a job is running.
    ///
    /// # Errors
    ///
    /// Returns `JobConflict` without touching any state if the current job
    /// is still processing.
    pub fn try_begin(&self, job_id: Uuid) -> IngestResult<()> {
        let mut state = self.state.write();
        if state.status.is_processing() {
            return Err(IngestError::JobConflict { kind: self.kind });
        }
        *state = JobState {
            job_id: Some(job_id),
            status: JobStatus::Processing,
            message: "Starting import...".to_string(),
            started_at: Some(Utc::now()),
            started: Some(Instant::now()),
            estimated_time: self.kind.tracks_throughput().then(|| ETA_PENDING.to_string()),
            ..JobState::default()
        };
        Ok(())
    }

    /// Count one source row
    pub fn record_row(&self, outcome: RowOutcome) {
        let mut state = self.state.write();
        let counters = &mut state.counters;
        counters.total_rows += 1;
        match outcome {
            RowOutcome::Admitted => counters.admitted_rows += 1,
            RowOutcome::Filtered => counters.filtered_rows += 1,
            RowOutcome::Malformed => counters.malformed_rows += 1,
        }
    }

    /// Count a committed batch
    pub fn record_persisted(&self, rows: u64) {
        self.state.write().counters.persisted_rows += rows;
        #[cfg(feature = "metrics")]
        metrics::counter!("bulkload_rows_persisted_total", "kind" => self.kind.as_str())
            .increment(rows);
    }

    /// Count a batch the store rejected
    pub fn record_batch_failure(&self, rows: u64) {
        self.state.write().counters.failed_batch_rows += rows;
        #[cfg(feature = "metrics")]
        metrics::counter!("bulkload_rows_failed_total", "kind" => self.kind.as_str())
            .increment(rows);
    }

    /// Replace the status message
    pub fn set_message(&self, message: impl Into<String>) {
        self.state.write().message = message.into();
    }

    /// Recompute throughput, elapsed time and ETA
    pub fn sample(&self) {
        let mut state = self.state.write();
        if !state.status.is_processing() {
            return;
        }
        let Some(started) = state.started else {
            return;
        };
        let elapsed = started.elapsed();
        let counters = state.counters;
        let (speed, eta) = throughput(&counters, elapsed);

        state.speed = Some(speed);
        state.elapsed_time = Some(format_seconds(elapsed.as_secs_f64()));
        state.estimated_time = Some(eta);
    }

    /// Terminal success
    pub fn complete(&self, message: impl Into<String>) {
        let mut state = self.state.write();
        self.finish(&mut state, JobStatus::Completed, message.into());
        if self.kind.tracks_throughput() {
            state.estimated_time = Some("0s".to_string());
        }
        if self.kind.tracks_filter_ratio() {
            state.filter_percentage = Some(ratio(
                state.counters.persisted_rows,
                state.counters.total_rows,
            ));
        }
    }

    /// Terminal failure.
    ///
    /// Admitted rows that never reached the store (still queued, buffered
    /// in the batcher or held by the producer when the job stopped) are
    /// counted as failed batch rows.
    pub fn fail(&self, message: impl Into<String>) {
        let mut state = self.state.write();
        let counters = &mut state.counters;
        let abandoned = counters
            .admitted_rows
            .saturating_sub(counters.persisted_rows + counters.failed_batch_rows);
        if abandoned > 0 {
            counters.failed_batch_rows += abandoned;
            debug!(kind = %self.kind, rows = abandoned, "unpersisted rows counted as failed");
        }
        self.finish(&mut state, JobStatus::Failed, message.into());
    }

    fn finish(&self, state: &mut JobState, status: JobStatus, message: String) {
        state.status = status;
        state.message = message;
        state.finished_at = Some(Utc::now());
        if let (true, Some(started)) = (self.kind.tracks_throughput(), state.started) {
            let elapsed = started.elapsed();
            state.speed = Some(throughput(&state.counters, elapsed).0);
            state.elapsed_time = Some(format_seconds(elapsed.as_secs_f64()));
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.state.read().status
    }

    /// Copy of the counters
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.state.read().counters
    }

    /// Consistent copy of the whole state
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read();
        let counters = state.counters;
        let progress = if state.status == JobStatus::Completed {
            100.0
        } else {
            ratio(counters.persisted_rows, counters.total_rows)
        };

        ProgressSnapshot {
            job_id: state.job_id,
            kind: self.kind,
            status: state.status,
            total_rows: counters.total_rows,
            admitted_rows: counters.admitted_rows,
            imported_rows: counters.persisted_rows,
            failed_rows: counters.failed_rows(),
            filtered_rows: counters.filtered_rows,
            progress,
            message: state.message.clone(),
            speed: state.speed,
            elapsed_time: state.elapsed_time.clone(),
            estimated_time: state.estimated_time.clone(),
            filter_percentage: state.filter_percentage,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

/// Periodically sample `tracker` until `stop` is cancelled
pub fn spawn_sampler(
    tracker: Arc<ProgressTracker>,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => tracker.sample(),
            }
        }
        debug!(kind = %tracker.kind(), "progress sampler stopped");
    })
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn throughput(counters: &Counters, elapsed: Duration) -> (f64, String) {
    let secs = elapsed.as_secs_f64();
    let processed = counters.persisted_rows;
    let speed = if secs > 0.0 {
        processed as f64 / secs
    } else {
        0.0
    };
    let eta = if speed > 0.0 && counters.total_rows > processed {
        format_seconds((counters.total_rows - processed) as f64 / speed)
    } else {
        ETA_PENDING.to_string()
    };
    (speed, eta)
}

fn format_seconds(secs: f64) -> String {
    format!("{secs:.1}s")
}
