//! Bulkload Ingestion Error System
//!
//! Job-level errors (`IngestError`) abort a job or reject a request; row-level
//! errors (`RowError`) are counted and logged while the stream continues.

use thiserror::Error;

use crate::types::JobKind;

/// Result type for all ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Main error type for ingestion operations
#[derive(Error, Debug)]
pub enum IngestError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Missing or unreadable input
    #[error("Input error: {reason}")]
    Input {
        /// Reason the input was rejected
        reason: String,
    },

    /// Input larger than the configured ceiling
    #[error("Input too large: {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge {
        /// Actual input size in bytes
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// No header line found in the scan window
    #[error("Header not found in the first {scanned_lines} lines")]
    HeaderNotFound {
        /// Number of lines inspected
        scanned_lines: usize,
    },

    /// A job of the same kind is already processing
    #[error("Import already in progress: {kind}")]
    JobConflict {
        /// Job kind that is busy
        kind: JobKind,
    },

    /// Job was cancelled by the caller
    #[error("Import cancelled: {kind}")]
    Cancelled {
        /// Job kind that was cancelled
        kind: JobKind,
    },

    /// Pipeline stage errors
    #[error("Pipeline operation failed: {stage} - {reason}")]
    Pipeline {
        /// Pipeline stage that failed
        stage: String,
        /// Reason for failure
        reason: String,
    },

    /// Storage operation errors
    #[error("Storage operation failed: {operation} - {reason}")]
    Storage {
        /// Operation that failed
        operation: String,
        /// Reason for failure
        reason: String,
    },

    /// CSV decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `SQLite` errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error (use sparingly)
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl IngestError {
    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create input error
    pub fn input(reason: impl Into<String>) -> Self {
        Self::Input {
            reason: reason.into(),
        }
    }

    /// Create pipeline error
    pub fn pipeline(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create storage error
    pub fn storage(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create internal error (use sparingly)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Errors the caller caused by what it sent: no file, unreadable file,
    /// undetectable header or an oversized upload
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Input { .. }
                | Self::InputTooLarge { .. }
                | Self::HeaderNotFound { .. }
                | Self::Validation { .. }
        )
    }

    /// HTTP-equivalent status code for surfacing this error to a caller
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Input { .. }
            | Self::InputTooLarge { .. }
            | Self::HeaderNotFound { .. }
            | Self::Validation { .. }
            | Self::Csv(_) => 400,
            Self::JobConflict { .. } => 409,
            Self::Cancelled { .. } => 499,
            Self::Configuration { .. }
            | Self::Pipeline { .. }
            | Self::Storage { .. }
            | Self::Sqlite(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Internal { .. } => 500,
        }
    }

    /// Monitoring code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Input { .. } | Self::InputTooLarge { .. } | Self::Io(_) => {
                ErrorCode::SourceUnreadable
            }
            Self::HeaderNotFound { .. } => ErrorCode::SourceHeaderNotFound,
            Self::Csv(_) => ErrorCode::SourceMalformed,
            Self::JobConflict { .. } => ErrorCode::JobConflict,
            Self::Cancelled { .. } => ErrorCode::JobCancelled,
            Self::Pipeline { .. } => ErrorCode::PipelineStage,
            Self::Storage { .. } | Self::Sqlite(_) => ErrorCode::StorageInsert,
            Self::Configuration { .. } | Self::Validation { .. } => ErrorCode::Configuration,
            Self::Serialization(_) | Self::Internal { .. } => ErrorCode::Internal,
        }
    }
}

/// Row-level rejection: the row is skipped, counted as failed, and the
/// stream continues
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Required field absent from the header or empty in the row
    #[error("missing required field '{field}'")]
    MissingField {
        /// Canonical field name
        field: &'static str,
    },

    /// Date cell matched none of the accepted formats
    #[error("invalid date in '{field}': {value:?}")]
    InvalidDate {
        /// Canonical field name
        field: &'static str,
        /// Raw cell value
        value: String,
    },

    /// Amount cell could not be parsed as a number
    #[error("invalid amount in '{field}': {value:?}")]
    InvalidAmount {
        /// Canonical field name
        field: &'static str,
        /// Raw cell value
        value: String,
    },

    /// The record itself could not be decoded
    #[error("malformed record: {reason}")]
    Malformed {
        /// Decoder message
        reason: String,
    },
}

/// Ingestion error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Source errors (1000-1099)
    SourceUnreadable = 1001,
    SourceHeaderNotFound = 1002,
    SourceMalformed = 1003,

    /// Job errors (1100-1199)
    JobConflict = 1101,
    JobCancelled = 1102,

    /// Pipeline errors (1200-1299)
    PipelineStage = 1201,

    /// Storage errors (1300-1399)
    StorageInsert = 1301,

    /// Setup errors (1400-1499)
    Configuration = 1401,
    Internal = 1402,
}

impl ErrorCode {
    /// Get error code as u16
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get error category
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match *self as u16 {
            1000..=1099 => "source",
            1100..=1199 => "job",
            1200..=1299 => "pipeline",
            1300..=1399 => "storage",
            1400..=1499 => "setup",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(IngestError::input("No file uploaded").status_code(), 400);
        assert_eq!(
            IngestError::HeaderNotFound { scanned_lines: 10 }.status_code(),
            400
        );
        assert_eq!(
            IngestError::JobConflict {
                kind: JobKind::BalanceDrop
            }
            .status_code(),
            409
        );
        assert_eq!(IngestError::storage("insert", "locked").status_code(), 500);
    }

    #[test]
    fn test_input_errors_are_flagged() {
        assert!(IngestError::input("missing").is_input_error());
        assert!(IngestError::InputTooLarge { size: 2, limit: 1 }.is_input_error());
        assert!(!IngestError::internal("boom").is_input_error());
    }

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::SourceHeaderNotFound.category(), "source");
        assert_eq!(ErrorCode::JobConflict.category(), "job");
        assert_eq!(ErrorCode::StorageInsert.as_u16(), 1301);
    }

    #[test]
    fn test_row_error_display() {
        let err = RowError::InvalidDate {
            field: "period",
            value: "31-31-2024".to_string(),
        };
        assert_eq!(err.to_string(), "invalid date in 'period': \"31-31-2024\"");
    }
}
