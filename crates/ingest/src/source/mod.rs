//! Source Module
//!
//! Delimited-text reading with header auto-detection, and the alias-driven
//! schema resolver that maps header cells to canonical fields.

pub mod reader;
pub mod schema;

pub use reader::{DetectedHeader, HeaderProbe, ReadOutcome, RawRow, SourceReader};
pub use schema::{AliasTable, ColumnMap, FieldAliases};
