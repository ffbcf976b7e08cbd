//! Bulkload Ingestion - Concurrent Bulk CSV Import Engine
//!
//! Streams large delimited-text files into a store through a bounded
//! producer/consumer pipeline with live progress reporting.

#![allow(clippy::significant_drop_tightening)] // Tracker locks are held for whole state updates
#![allow(clippy::option_if_let_else)] // Pattern matching reads better for row outcomes
#![allow(clippy::module_name_repetitions)] // IngestConfig, IngestError and friends
#![allow(clippy::missing_errors_doc)] // Error documentation is handled at module level
#![allow(clippy::cast_precision_loss)] // Row counts fit comfortably in f64 for percentages
#![allow(clippy::cast_possible_truncation)] // Elapsed milliseconds fit in u64
//!
//! # Features
//!
//! - **Header Auto-Detection**: preamble lines skipped, delimiter chosen by probe
//! - **Alias Resolution**: source column names mapped onto canonical fields
//! - **Row-Level Tolerance**: malformed rows are counted, never fatal
//! - **Backpressure**: bounded queue between one producer and N workers
//! - **Admission Filters**: balance-drop threshold applied before batching
//! - **Three Importers**: sales pipeline, balance drop and staff roster (RFMT)
//! - **Live Progress**: counters, throughput and ETA per job kind
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────┐   ┌─────────┐   ┌────────────┐
//! │  Source  │──▶│ Normalizer │──▶│ Filter │──▶│ Batcher │──▶│ Dispatcher │
//! │  Reader  │   │            │   │        │   │         │   │  (bounded) │
//! └──────────┘   └────────────┘   └────────┘   └─────────┘   └─────┬──────┘
//!                                                                   │
//!                          ┌──────────────┬──────────────┬──────────┘
//!                          ▼              ▼              ▼
//!                     ┌─────────┐    ┌─────────┐    ┌─────────┐
//!                     │ Worker 0│    │ Worker 1│ …  │ Worker N│ ──▶ RecordStore
//!                     └─────────┘    └─────────┘    └─────────┘
//!                                  ProgressTracker
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bulkload_ingest::{IngestConfig, IngestService, IngestSource, JobKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = IngestService::new(IngestConfig::default())?;
//!
//!     let handle = service.start(JobKind::Pipeline, IngestSource::file("pipelines.csv"))?;
//!     let report = handle.wait().await?;
//!     println!("{}", report.message);
//!
//!     let snapshot = service.progress(JobKind::Pipeline);
//!     println!("{}", serde_json::to_string_pretty(&snapshot)?);
//!     Ok(())
//! }
//! ```

// Public exports
pub use config::*;
pub use error::*;
pub use types::*;

// Internal modules
pub mod config;
pub mod error;
pub mod types;

// Input side
pub mod records;
pub mod source;

// Pipeline processing
pub mod pipeline;
pub mod progress;
pub mod supervisor;

// Storage modules
pub mod storage;

// Caller-facing surface
pub mod api;
pub mod service;

// Re-exports for convenience
pub use api::ApiResponse;
pub use progress::{Counters, ProgressSnapshot, ProgressTracker};
pub use records::{BalanceRecord, PipelineRecord, Record, RfmtRecord};
pub use service::{IngestService, IngestSource, Stores};
pub use storage::{DynStore, MemoryStore, RecordStore, SqliteStore, StoredRecord};
pub use supervisor::{JobHandle, JobReport, JobSupervisor};
