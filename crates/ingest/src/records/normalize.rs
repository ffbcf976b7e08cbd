//! Normalization primitives shared by record types

use crate::error::RowError;
use crate::source::{ColumnMap, RawRow};
use chrono::NaiveDate;

/// Placeholder stored for absent descriptive fields
pub const SENTINEL: &str = "N/A";

/// Accepted date formats, tried in order
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Cell accessor bound to one row and its column map
#[derive(Debug, Clone, Copy)]
pub struct Cells<'a> {
    row: &'a RawRow,
    columns: &'a ColumnMap,
}

impl<'a> Cells<'a> {
    /// Bind a row to a column map
    #[must_use]
    pub const fn new(row: &'a RawRow, columns: &'a ColumnMap) -> Self {
        Self { row, columns }
    }

    /// Trimmed cell value, `""` if unmapped
    #[must_use]
    pub fn raw(&self, field: &str) -> &'a str {
        self.columns.cell(self.row, field)
    }

    /// Non-empty identifier
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if the cell is empty.
    pub fn required(&self, field: &'static str) -> Result<String, RowError> {
        let value = self.raw(field);
        if value.is_empty() {
            return Err(RowError::MissingField { field });
        }
        Ok(value.to_string())
    }

    /// Descriptive field, defaulted to the sentinel
    #[must_use]
    pub fn descriptive(&self, field: &str) -> String {
        descriptive(self.raw(field))
    }

    /// Required date
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if empty or `InvalidDate` if no format matches.
    pub fn required_date(&self, field: &'static str) -> Result<NaiveDate, RowError> {
        let value = self.raw(field);
        if value.is_empty() {
            return Err(RowError::MissingField { field });
        }
        parse_date(value).ok_or_else(|| RowError::InvalidDate {
            field,
            value: value.to_string(),
        })
    }

    /// Optional date; empty or unparsable cells yield `None`
    #[must_use]
    pub fn optional_date(&self, field: &str) -> Option<NaiveDate> {
        parse_date(self.raw(field))
    }

    /// Required amount
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if empty or `InvalidAmount` if unparsable.
    pub fn required_amount(&self, field: &'static str) -> Result<i64, RowError> {
        let value = self.raw(field);
        if value.is_empty() {
            return Err(RowError::MissingField { field });
        }
        parse_amount(value).ok_or_else(|| RowError::InvalidAmount {
            field,
            value: value.to_string(),
        })
    }

    /// Optional amount; empty or unparsable cells yield `None`
    #[must_use]
    pub fn optional_amount(&self, field: &str) -> Option<i64> {
        parse_amount(self.raw(field))
    }
}

/// Parse a date against [`DATE_FORMATS`]; first match wins
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Parse a locale-formatted amount: grouping commas and quotes are stripped,
/// the rest parsed as a decimal and truncated toward zero
#[must_use]
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '\''))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value.abs() >= 9.2e18 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(value.trunc() as i64)
}

/// Sentinel for absent, empty or lone-dash values
#[must_use]
pub fn descriptive(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        SENTINEL.to_string()
    } else {
        raw.to_string()
    }
}
