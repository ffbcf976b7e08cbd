//! Storage Collaborator Interface
//!
//! The pipeline persists through [`RecordStore`]: an all-or-nothing batch
//! insert, a filtered count and a filtered, paginated, ordered query.
//! Records carry no deduplication key, so importing the same file twice
//! stores every row twice.

use crate::error::IngestResult;
use crate::records::Record;
use crate::types::{Pagination, RecordFilter, SortOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqlRecord, SqliteStore};

/// Shared, type-erased store handle
pub type DynStore<R> = Arc<dyn RecordStore<R>>;

/// A persisted record with its storage-assigned identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord<R> {
    /// Monotonic insertion id
    pub id: i64,
    /// Commit timestamp of the batch that stored this record
    pub imported_at: DateTime<Utc>,
    /// Record fields
    #[serde(flatten)]
    pub record: R,
}

/// Durable store for one record type
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Insert every record in one transaction; nothing is stored on error.
    /// Returns the number of rows written.
    async fn batch_insert(&self, records: &[R]) -> IngestResult<u64>;

    /// Number of records matching `filter`
    async fn count(&self, filter: &RecordFilter) -> IngestResult<u64>;

    /// Matching records in `order`, windowed by `page`
    async fn query(
        &self,
        filter: &RecordFilter,
        page: &Pagination,
        order: SortOrder,
    ) -> IngestResult<Vec<StoredRecord<R>>>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
