//! Bulk ingestion command.
//!
//! # Usage
//!
//! ```bash
//! # Ingest users_data.json with 10 workers and a two-minute deadline
//! sika ingest
//!
//! # Explicit source and limits
//! sika ingest --file batch.json --workers 4 --deadline-secs 30
//! ```
//!
//! The process exits non-zero only when the source cannot be loaded. Records
//! that fail to insert are logged and listed in the summary, but do not fail
//! the run.

use std::sync::Arc;

use sika_server::config::IngestConfig;
use sika_server::db::Store;
use sika_server::services::StoreUserService;
use sika_server::services::ingest::{IngestPipeline, IngestReport};

use super::CommandError;
use crate::telemetry::shutdown_signal;

/// Run one ingestion pass over the configured source.
///
/// # Errors
///
/// Returns an error if the store cannot be reached, migrations fail, or the
/// source cannot be read or decoded.
pub async fn run(
    store_config: &sika_server::config::StoreConfig,
    ingest: &IngestConfig,
    migrate: bool,
) -> Result<IngestReport, CommandError> {
    let store = Store::connect(store_config).await?;
    if migrate {
        store.migrate().await?;
        tracing::info!("Migrations applied");
    }

    let service = Arc::new(StoreUserService::new(store));
    let pipeline = IngestPipeline::from_config(service, ingest);

    tracing::info!(
        source = %ingest.source.display(),
        workers = pipeline.workers(),
        deadline_secs = ingest.deadline.as_secs(),
        "Starting bulk ingestion"
    );

    let report = pipeline
        .run_file_until(&ingest.source, shutdown_signal())
        .await?;

    log_summary(&report);
    Ok(report)
}

fn log_summary(report: &IngestReport) {
    tracing::info!("Ingestion complete!");
    tracing::info!("  Records in batch: {}", report.total);
    tracing::info!("  Created: {}", report.succeeded.len());
    tracing::info!("  Unfinished: {}", report.unfinished());

    if !report.failed.is_empty() {
        tracing::warn!("  Failed: {}", report.failed.len());
        for record in &report.failed {
            tracing::warn!("    - {}: {}", record.id, record.error);
        }
    }

    if !report.is_drained() {
        tracing::warn!(completion = ?report.completion, "Run ended before every record was attempted");
    }
}
