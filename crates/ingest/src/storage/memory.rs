//! In-process record store

use super::{RecordStore, StoredRecord};
use crate::error::IngestResult;
use crate::records::Record;
use crate::types::{Pagination, RecordFilter, SortOrder};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;

#[derive(Debug)]
struct Inner<R> {
    rows: Vec<StoredRecord<R>>,
    next_id: i64,
}

/// Vector-backed store; used when no database path is configured
#[derive(Debug)]
pub struct MemoryStore<R> {
    inner: RwLock<Inner<R>>,
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl<R: Record> MemoryStore<R> {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored row count
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }

    fn matching<'a>(
        rows: &'a [StoredRecord<R>],
        filter: &RecordFilter,
    ) -> impl Iterator<Item = &'a StoredRecord<R>> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        rows.iter().filter(move |stored| {
            needle
                .as_deref()
                .map_or(true, |n| stored.record.matches_search(n))
        })
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryStore<R> {
    async fn batch_insert(&self, records: &[R]) -> IngestResult<u64> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        inner.rows.reserve(records.len());
        for record in records {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.rows.push(StoredRecord {
                id,
                imported_at: now,
                record: record.clone(),
            });
        }
        Ok(records.len() as u64)
    }

    async fn count(&self, filter: &RecordFilter) -> IngestResult<u64> {
        let inner = self.inner.read();
        Ok(Self::matching(&inner.rows, filter).count() as u64)
    }

    async fn query(
        &self,
        filter: &RecordFilter,
        page: &Pagination,
        order: SortOrder,
    ) -> IngestResult<Vec<StoredRecord<R>>> {
        let inner = self.inner.read();
        let mut hits: Vec<&StoredRecord<R>> = Self::matching(&inner.rows, filter).collect();
        hits.sort_by(|a, b| {
            let ord: Ordering = a
                .record
                .sort_date()
                .cmp(&b.record.sort_date())
                .then(a.id.cmp(&b.id));
            match order {
                SortOrder::NewestFirst => ord.reverse(),
                SortOrder::OldestFirst => ord,
            }
        });

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
