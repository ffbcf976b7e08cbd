//! Bulkload Shared Types
//!
//! Job identifiers, lifecycle states and the query types used by the
//! storage collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of ingestion job; at most one job per kind may be processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Generic importer: every normalized row is admitted
    Pipeline,
    /// Filtered importer: only rows whose balance dropped past the threshold
    BalanceDrop,
    /// Staff roster importer: every normalized row is admitted
    Rfmt,
}

impl JobKind {
    /// All job kinds, in registration order
    pub const ALL: [Self; 3] = [Self::Pipeline, Self::BalanceDrop, Self::Rfmt];

    /// Stable name used in logs, metrics and JSON
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::BalanceDrop => "balance_drop",
            Self::Rfmt => "rfmt",
        }
    }

    /// Whether the progress snapshot carries live throughput and ETA
    #[must_use]
    pub const fn tracks_throughput(self) -> bool {
        matches!(self, Self::Pipeline | Self::Rfmt)
    }

    /// Whether the progress snapshot carries the admitted/total ratio
    #[must_use]
    pub const fn tracks_filter_ratio(self) -> bool {
        matches!(self, Self::BalanceDrop)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job has run since process start
    #[default]
    Idle,
    /// Pipeline running
    Processing,
    /// Producer and workers drained
    Completed,
    /// Job could not start, or aborted
    #[serde(rename = "error")]
    Failed,
}

impl JobStatus {
    /// Whether a job is currently running
    #[must_use]
    pub const fn is_processing(self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Whether the job reached a final state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Record ordering for queries: by record date, then by insertion id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Latest date first, newest insert first
    #[default]
    NewestFirst,
    /// Earliest date first, oldest insert first
    OldestFirst,
}

/// Filter applied by `count` and `query`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Case-insensitive substring matched against searchable fields
    pub search: Option<String>,
}

impl RecordFilter {
    /// Filter with a search term; blank terms are treated as no filter
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        let term = term.into();
        let trimmed = term.trim();
        Self {
            search: if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            },
        }
    }
}

/// Offset/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Rows to skip
    pub offset: u64,
    /// Maximum rows to return
    pub limit: u64,
}

/// Caller-facing list query (1-based pages)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordQuery {
    /// Search term
    pub search: Option<String>,
    /// 1-based page number
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
    /// Result ordering
    pub order: SortOrder,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: 10,
            order: SortOrder::NewestFirst,
        }
    }
}

impl RecordQuery {
    /// Upper bound on `page_size`
    pub const MAX_PAGE_SIZE: u64 = 1000;

    /// Storage filter for this query
    #[must_use]
    pub fn filter(&self) -> RecordFilter {
        self.search
            .as_deref()
            .map_or_else(RecordFilter::default, RecordFilter::search)
    }

    /// Offset/limit window, clamping page to >= 1 and size to 1..=`MAX_PAGE_SIZE`
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        let page = self.page.max(1);
        let limit = self.page_size.clamp(1, Self::MAX_PAGE_SIZE);
        Pagination {
            offset: (page - 1).saturating_mul(limit),
            limit,
        }
    }
}

/// Page metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Rows matching the filter
    pub total_records: u64,
    /// Number of pages at this page size
    pub total_pages: u64,
    /// 1-based page returned
    pub current_page: u64,
    /// Rows per page
    pub page_size: u64,
}

/// One page of query results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page
    pub data: Vec<T>,
    /// Page metadata
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Assemble a page from a query, its total count and the fetched rows
    #[must_use]
    pub fn new(query: &RecordQuery, total_records: u64, data: Vec<T>) -> Self {
        let window = query.pagination();
        Self {
            data,
            pagination: PageInfo {
                total_records,
                total_pages: total_records.div_ceil(window.limit),
                current_page: query.page.max(1),
                page_size: window.limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_failed_as_error() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&JobStatus::Failed)?, "\"error\"");
        assert_eq!(serde_json::to_string(&JobStatus::Processing)?, "\"processing\"");
        assert_eq!(serde_json::to_string(&JobKind::BalanceDrop)?, "\"balance_drop\"");
        assert_eq!(serde_json::to_string(&JobKind::Rfmt)?, "\"rfmt\"");
        Ok(())
    }

    #[test]
    fn test_query_pagination_clamps() {
        let query = RecordQuery {
            page: 0,
            page_size: 0,
            ..RecordQuery::default()
        };
        assert_eq!(query.pagination(), Pagination { offset: 0, limit: 1 });

        let query = RecordQuery {
            page: 3,
            page_size: 25,
            ..RecordQuery::default()
        };
        assert_eq!(
            query.pagination(),
            Pagination {
                offset: 50,
                limit: 25
            }
        );
    }

    #[test]
    fn test_page_counts_partial_last_page() {
        let query = RecordQuery {
            page: 2,
            page_size: 10,
            ..RecordQuery::default()
        };
        let page = Page::new(&query, 21, vec![1, 2, 3]);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.current_page, 2);
    }

    #[test]
    fn test_blank_search_is_no_filter() {
        assert_eq!(RecordFilter::search("   "), RecordFilter::default());
        assert_eq!(
            RecordFilter::search(" Budi ").search.as_deref(),
            Some("Budi")
        );
    }
}
