//! Ingestion Service
//!
//! Entry point for callers: validates sources, wires each job kind to its
//! record type, admission filter and store, and answers progress and list
//! queries.

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::pipeline::{AdmitAll, DropThresholdFilter};
use crate::progress::ProgressSnapshot;
use crate::records::{BalanceRecord, PipelineRecord, Record, RfmtRecord};
use crate::storage::sqlite::open_shared;
use crate::storage::{DynStore, MemoryStore, SqliteStore, StoredRecord};
use crate::supervisor::{JobHandle, JobSupervisor};
use crate::types::{JobKind, Page, RecordQuery};
use std::borrow::Cow;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

type BoxedSource = Box<dyn Read + Send>;

/// Where an import reads from
#[derive(Debug, Clone)]
pub enum IngestSource {
    /// File on local disk
    File {
        /// File path
        path: PathBuf,
    },
    /// In-memory upload
    Upload {
        /// Client-supplied file name
        file_name: String,
        /// File contents
        bytes: Vec<u8>,
    },
}

impl IngestSource {
    /// Source backed by a file path
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Source backed by uploaded bytes
    #[must_use]
    pub fn upload(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Upload {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    fn name(&self) -> Cow<'_, str> {
        match self {
            Self::File { path } => path
                .file_name()
                .map_or(Cow::Borrowed(""), |n| n.to_string_lossy()),
            Self::Upload { file_name, .. } => Cow::Borrowed(file_name),
        }
    }

    /// Check the extension and size, then open for reading
    fn open(self, config: &IngestConfig) -> IngestResult<BoxedSource> {
        let name = self.name();
        if name.is_empty() {
            return Err(IngestError::input("No file uploaded"));
        }
        if !has_allowed_extension(&name, &config.source.allowed_extensions) {
            return Err(IngestError::input(format!(
                "File must be one of: {}",
                config.source.allowed_extensions.join(", ")
            )));
        }

        let limit = config.source.max_upload_bytes;
        match self {
            Self::File { path } => {
                let unreadable = |e: std::io::Error| {
                    IngestError::input(format!("Failed to open {}: {e}", path.display()))
                };
                let file = File::open(&path).map_err(unreadable)?;
                let metadata = file.metadata().map_err(unreadable)?;
                if !metadata.is_file() {
                    return Err(IngestError::input(format!(
                        "Failed to open {}: not a regular file",
                        path.display()
                    )));
                }
                let size = metadata.len();
                if size > limit {
                    return Err(IngestError::InputTooLarge { size, limit });
                }
                Ok(Box::new(file))
            }
            Self::Upload { bytes, .. } => {
                let size = bytes.len() as u64;
                if size > limit {
                    return Err(IngestError::InputTooLarge { size, limit });
                }
                Ok(Box::new(Cursor::new(bytes)))
            }
        }
    }
}

fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// One store per job kind
#[derive(Clone)]
pub struct Stores {
    /// Generic importer records
    pub pipelines: DynStore<PipelineRecord>,
    /// Filtered importer records
    pub balances: DynStore<BalanceRecord>,
    /// Staff roster records
    pub rfmts: DynStore<RfmtRecord>,
}

impl Stores {
    /// In-memory stores
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            pipelines: Arc::new(MemoryStore::new()),
            balances: Arc::new(MemoryStore::new()),
            rfmts: Arc::new(MemoryStore::new()),
        }
    }

    /// `SQLite` stores sharing one database file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or a table created.
    pub fn sqlite(path: &Path) -> IngestResult<Self> {
        let conn = open_shared(path)?;
        info!(path = %path.display(), "using sqlite store");
        Ok(Self {
            pipelines: Arc::new(SqliteStore::attach(Arc::clone(&conn))?),
            balances: Arc::new(SqliteStore::attach(Arc::clone(&conn))?),
            rfmts: Arc::new(SqliteStore::attach(conn)?),
        })
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("pipelines", &self.pipelines.backend())
            .field("balances", &self.balances.backend())
            .field("rfmts", &self.rfmts.backend())
            .finish()
    }
}

/// Bulk import service
#[derive(Debug)]
pub struct IngestService {
    supervisor: JobSupervisor,
    stores: Stores,
}

impl IngestService {
    /// Build a service from validated configuration.
    ///
    /// All stores share one `SQLite` file when `storage.database_path` is
    /// set; otherwise records live in memory.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the database cannot
    /// be opened.
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;
        let stores = match &config.storage.database_path {
            Some(path) => Stores::sqlite(path)?,
            None => Stores::in_memory(),
        };
        Ok(Self::with_stores(config, stores))
    }

    /// Build a service over caller-supplied stores
    #[must_use]
    pub fn with_stores(config: IngestConfig, stores: Stores) -> Self {
        Self {
            supervisor: JobSupervisor::new(Arc::new(config)),
            stores,
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        self.supervisor.config()
    }

    /// Start an import in the background.
    ///
    /// The job moves to `Processing` before the source is checked, so a
    /// rejected source leaves the job `Failed` with the reason as message.
    ///
    /// # Errors
    ///
    /// Returns `JobConflict` if a job of this kind is running, or an input
    /// error if the source is missing, has the wrong extension, is too
    /// large, or has no recognizable header.
    pub fn start(&self, kind: JobKind, source: IngestSource) -> IngestResult<JobHandle> {
        let config = self.supervisor.config();
        let open = || source.open(config);
        match kind {
            JobKind::Pipeline => self.supervisor.start::<PipelineRecord, _, _>(
                open,
                Arc::new(AdmitAll),
                Arc::clone(&self.stores.pipelines),
            ),
            JobKind::BalanceDrop => self.supervisor.start::<BalanceRecord, _, _>(
                open,
                Arc::new(DropThresholdFilter::new(config.filter.drop_threshold_percent)),
                Arc::clone(&self.stores.balances),
            ),
            JobKind::Rfmt => self.supervisor.start::<RfmtRecord, _, _>(
                open,
                Arc::new(AdmitAll),
                Arc::clone(&self.stores.rfmts),
            ),
        }
    }

    /// Progress of the current or last job of `kind`
    #[must_use]
    pub fn progress(&self, kind: JobKind) -> ProgressSnapshot {
        self.supervisor.snapshot(kind)
    }

    /// Page of stored pipeline records
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn list_pipelines(
        &self,
        query: &RecordQuery,
    ) -> IngestResult<Page<StoredRecord<PipelineRecord>>> {
        list(&self.stores.pipelines, query).await
    }

    /// Page of stored balance records
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn list_balances(
        &self,
        query: &RecordQuery,
    ) -> IngestResult<Page<StoredRecord<BalanceRecord>>> {
        list(&self.stores.balances, query).await
    }

    /// Page of stored staff roster records
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub async fn list_rfmts(
        &self,
        query: &RecordQuery,
    ) -> IngestResult<Page<StoredRecord<RfmtRecord>>> {
        list(&self.stores.rfmts, query).await
    }
}

async fn list<R: Record>(
    store: &DynStore<R>,
    query: &RecordQuery,
) -> IngestResult<Page<StoredRecord<R>>> {
    let filter = query.filter();
    let total = store.count(&filter).await?;
    let data = store
        .query(&filter, &query.pagination(), query.order)
        .await?;
    Ok(Page::new(query, total, data))
}
