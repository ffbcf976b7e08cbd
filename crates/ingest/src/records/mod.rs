//! Record Types
//!
//! Canonical typed records produced by the normalizer, one per job kind.
//! Each record type carries its own alias table and header probes.

pub mod balance;
pub mod normalize;
pub mod pipeline;
pub mod rfmt;

pub use balance::BalanceRecord;
pub use pipeline::PipelineRecord;
pub use rfmt::RfmtRecord;

use crate::error::RowError;
use crate::source::{AliasTable, ColumnMap, HeaderProbe, RawRow};
use crate::types::JobKind;
use chrono::NaiveDate;
use serde::Serialize;

/// Normalized record that flows through the pipeline into a store
pub trait Record: Clone + Send + Sync + Serialize + std::fmt::Debug + 'static {
    /// Job kind that ingests this record type
    const KIND: JobKind;

    /// Alias table used to resolve the header
    fn aliases() -> AliasTable;

    /// Delimiter/marker probes for header detection, in priority order
    fn header_probes() -> &'static [HeaderProbe];

    /// Convert a raw row into a record, or reject it
    ///
    /// # Errors
    ///
    /// Returns a `RowError` if a required field is missing or malformed.
    fn normalize(row: &RawRow, columns: &ColumnMap) -> Result<Self, RowError>;

    /// Date used for ordering query results; records without one are
    /// ordered by insertion id alone
    fn sort_date(&self) -> Option<NaiveDate>;

    /// Whether any searchable field contains `needle` (already lowercased)
    fn matches_search(&self, needle: &str) -> bool;
}

/// Case-insensitive containment check across several fields
pub(crate) fn any_contains(fields: &[&str], needle: &str) -> bool {
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}
