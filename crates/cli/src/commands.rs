use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bulkload_ingest::{
    IngestConfig, IngestService, IngestSource, JobKind, JobStatus, RecordQuery, SortOrder,
};
use tracing::info;

use crate::cli::{ImportArgs, ListArgs};

fn load_config(path: Option<&Path>, db: Option<&Path>) -> Result<IngestConfig> {
    let mut config = match path {
        Some(path) => IngestConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    if let Some(db) = db {
        config.storage.database_path = Some(db.to_path_buf());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub async fn import(args: ImportArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.db.as_deref())?;
    let interval = config.sample_interval().max(Duration::from_millis(250));
    let kind = JobKind::from(args.kind);
    let service = IngestService::new(config).context("failed to initialise service")?;

    let handle = service
        .start(kind, IngestSource::file(&args.file))
        .with_context(|| format!("failed to start import of {}", args.file.display()))?;
    info!(%kind, job_id = %handle.job_id(), file = %args.file.display(), "import started");

    let mut ticker = tokio::time::interval(interval);
    while !handle.is_finished() {
        ticker.tick().await;
        let snapshot = service.progress(kind);
        info!(
            processed = snapshot.total_rows,
            imported = snapshot.imported_rows,
            failed = snapshot.failed_rows,
            progress = %format!("{:.1}%", snapshot.progress),
            eta = snapshot.estimated_time.as_deref().unwrap_or("-"),
            "{}",
            snapshot.message
        );
    }

    let outcome = handle.wait().await;
    let snapshot = service.progress(kind);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if let Err(err) = outcome {
        return Err(anyhow::Error::new(err).context("import failed"));
    }
    if snapshot.status != JobStatus::Completed {
        bail!("import ended in state {:?}", snapshot.status);
    }
    Ok(())
}

pub async fn list(args: ListArgs) -> Result<()> {
    if !args.db.exists() {
        bail!("database {} does not exist", args.db.display());
    }
    let config = load_config(None, Some(&args.db))?;
    let service = IngestService::new(config).context("failed to open database")?;

    let query = RecordQuery {
        search: args.search,
        page: args.page,
        page_size: args.page_size,
        order: if args.oldest_first {
            SortOrder::OldestFirst
        } else {
            SortOrder::NewestFirst
        },
    };
    let body = match JobKind::from(args.kind) {
        JobKind::Pipeline => {
            serde_json::to_string_pretty(&service.list_pipelines(&query).await?)?
        }
        JobKind::BalanceDrop => {
            serde_json::to_string_pretty(&service.list_balances(&query).await?)?
        }
        JobKind::Rfmt => serde_json::to_string_pretty(&service.list_rfmts(&query).await?)?,
    };
    println!("{body}");
    Ok(())
}
