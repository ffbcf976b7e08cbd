//! Pipeline Processing Module
//!
//! The stages between a located header and the store: admission filtering,
//! batching, the bounded dispatcher, the producer loop and the persistence
//! worker pool.

pub mod batcher;
pub mod dispatcher;
pub mod filter;
pub mod producer;
pub mod worker;

pub use batcher::{Batch, Batcher};
pub use dispatcher::{BatchReceiver, BatchSender};
pub use filter::{AdmissionFilter, AdmitAll, DropMetric, DropThresholdFilter};
pub use producer::{produce, ProducerReport};
pub use worker::{PersistenceWorker, WorkerReport};
