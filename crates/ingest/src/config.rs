//! Bulkload Ingestion Configuration
//!
//! Typed, validated configuration with TOML file loading and `BULKLOAD_*`
//! environment overrides.

use crate::error::{IngestError, IngestResult};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling on worker pool size when sized from the CPU count
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// Batching, queueing and worker pool
    #[garde(dive)]
    pub pipeline: PipelineConfig,

    /// Source limits and header detection
    #[garde(dive)]
    pub source: SourceConfig,

    /// Progress sampling
    #[garde(dive)]
    pub progress: ProgressConfig,

    /// Admission filter
    #[garde(dive)]
    pub filter: FilterConfig,

    /// Persistent store
    #[garde(dive)]
    pub storage: StorageConfig,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records per sealed batch
    #[garde(range(min = 1, max = 65_535))]
    pub batch_size: usize,

    /// Batches the dispatcher holds before the producer blocks
    #[garde(range(min = 1, max = 10_000))]
    pub queue_capacity: usize,

    /// Persistence workers
    #[garde(range(min = 1, max = 256))]
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 4000,
            queue_capacity: 100,
            worker_count: num_cpus::get().clamp(1, DEFAULT_MAX_WORKERS),
        }
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Largest accepted upload in bytes
    #[garde(range(min = 1))]
    pub max_upload_bytes: u64,

    /// Leading lines scanned for a header
    #[garde(range(min = 1, max = 1000))]
    pub header_scan_lines: usize,

    /// Accepted file extensions, lowercase, without the dot
    #[garde(length(min = 1))]
    pub allowed_extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 1 << 30,
            header_scan_lines: 10,
            allowed_extensions: vec!["csv".to_string()],
        }
    }
}

/// Progress configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProgressConfig {
    /// Throughput sampling interval (milliseconds)
    #[garde(range(min = 10, max = 60_000))]
    pub sample_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 500,
        }
    }
}

/// Admission filter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum drop from average to current balance, in percent
    #[garde(range(min = 0.0_f64, max = 100.0_f64))]
    pub drop_threshold_percent: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            drop_threshold_percent: 50.0,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database file; `None` keeps records in memory
    #[garde(skip)]
    pub database_path: Option<PathBuf>,
}

impl IngestConfig {
    /// Load configuration from a TOML file; missing keys take defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn from_toml_file(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            IngestError::configuration(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `BULKLOAD_*` environment overrides applied
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration fails validation.
    pub fn from_env() -> IngestResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup; unparsable values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }

        self.pipeline.batch_size =
            parsed(&lookup, "BULKLOAD_BATCH_SIZE").unwrap_or(self.pipeline.batch_size);
        self.pipeline.queue_capacity =
            parsed(&lookup, "BULKLOAD_QUEUE_CAPACITY").unwrap_or(self.pipeline.queue_capacity);
        self.pipeline.worker_count =
            parsed(&lookup, "BULKLOAD_WORKERS").unwrap_or(self.pipeline.worker_count);
        self.source.max_upload_bytes =
            parsed(&lookup, "BULKLOAD_MAX_UPLOAD_BYTES").unwrap_or(self.source.max_upload_bytes);
        self.source.header_scan_lines =
            parsed(&lookup, "BULKLOAD_HEADER_SCAN_LINES").unwrap_or(self.source.header_scan_lines);
        self.progress.sample_interval_ms = parsed(&lookup, "BULKLOAD_SAMPLE_INTERVAL_MS")
            .unwrap_or(self.progress.sample_interval_ms);
        self.filter.drop_threshold_percent = parsed(&lookup, "BULKLOAD_DROP_THRESHOLD")
            .unwrap_or(self.filter.drop_threshold_percent);
        if let Some(path) = lookup("BULKLOAD_DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration validation fails.
    pub fn validate(&self) -> IngestResult<()> {
        garde::Validate::validate(self)
            .map_err(|e| IngestError::validation("config", format!("Validation failed: {e}")))?;

        if self
            .source
            .allowed_extensions
            .iter()
            .any(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(IngestError::validation(
                "allowed_extensions",
                "Extensions must be non-empty and given without a leading dot",
            ));
        }

        if !self.filter.drop_threshold_percent.is_finite() {
            return Err(IngestError::validation(
                "drop_threshold_percent",
                "Threshold must be a finite number",
            ));
        }

        Ok(())
    }

    /// Get progress sampling interval
    #[must_use]
    #[inline]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.progress.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() -> IngestResult<()> {
        let config = IngestConfig::default();
        config.validate()?;
        assert_eq!(config.pipeline.batch_size, 4000);
        assert_eq!(config.pipeline.queue_capacity, 100);
        assert!((1..=DEFAULT_MAX_WORKERS).contains(&config.pipeline.worker_count));
        assert_eq!(config.source.max_upload_bytes, 1_073_741_824);
        assert_eq!(config.sample_interval(), Duration::from_millis(500));
        Ok(())
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BULKLOAD_BATCH_SIZE", "250"),
            ("BULKLOAD_WORKERS", "not-a-number"),
            ("BULKLOAD_DROP_THRESHOLD", "75.5"),
            ("BULKLOAD_DATABASE_PATH", "/tmp/bulkload.db"),
        ]
        .into_iter()
        .collect();

        let mut config = IngestConfig::default();
        let workers = config.pipeline.worker_count;
        config.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.pipeline.batch_size, 250);
        assert_eq!(config.pipeline.worker_count, workers);
        assert!((config.filter.drop_threshold_percent - 75.5).abs() < f64::EPSILON);
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/tmp/bulkload.db"))
        );
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = IngestConfig::default();
        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.filter.drop_threshold_percent = 150.0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.source.allowed_extensions = vec![".csv".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_file_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "[pipeline]\nbatch_size = 1000\n\n[filter]\ndrop_threshold_percent = 40.0")?;

        let config = IngestConfig::from_toml_file(file.path())?;
        assert_eq!(config.pipeline.batch_size, 1000);
        assert_eq!(config.pipeline.queue_capacity, 100);
        assert!((config.filter.drop_threshold_percent - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.source.header_scan_lines, 10);
        Ok(())
    }
}
