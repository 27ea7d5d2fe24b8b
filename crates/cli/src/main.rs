//! Sika CLI - serve the read API, run bulk ingestion, apply migrations.
//!
//! # Usage
//!
//! ```bash
//! # Serve GET /{id} until Ctrl+C / SIGTERM
//! sika serve
//!
//! # One bulk-ingestion pass (10 workers, 2 minute deadline by default)
//! sika ingest --file users_data.json
//!
//! # Apply database migrations
//! sika migrate
//! ```
//!
//! # Commands
//!
//! - `serve` (alias `server`) - Run the HTTP server
//! - `ingest` (alias `insert`) - Load a JSON batch and insert it concurrently
//! - `migrate` - Run database migrations
//!
//! Configuration comes from the environment (see `sika_server::config`);
//! flags override the ingest settings.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use sika_server::config::{AppConfig, IngestConfig, LogFormat};

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "sika")]
#[command(author, version, about = "Sika user record service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the read API
    #[command(alias = "server")]
    Serve {
        /// Apply pending migrations before serving
        #[arg(long)]
        migrate: bool,
    },
    /// Run one bulk-ingestion pass
    #[command(alias = "insert")]
    Ingest {
        /// JSON file containing an array of users
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of concurrent workers
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        workers: Option<u16>,

        /// Overall deadline in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        deadline_secs: Option<u64>,

        /// Apply pending migrations before ingesting
        #[arg(long)]
        migrate: bool,
    },
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(LogFormat::Text);
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve { migrate } => commands::serve::run(&config, migrate).await?,
        Commands::Ingest {
            file,
            workers,
            deadline_secs,
            migrate,
        } => {
            let ingest = ingest_overrides(&config.ingest, file, workers, deadline_secs);
            commands::ingest::run(&config.store, &ingest, migrate).await?;
        }
        Commands::Migrate => commands::migrate::run(&config).await?,
    }
    Ok(())
}

/// Apply command-line overrides on top of the configured ingest settings.
fn ingest_overrides(
    base: &IngestConfig,
    file: Option<PathBuf>,
    workers: Option<u16>,
    deadline_secs: Option<u64>,
) -> IngestConfig {
    IngestConfig {
        workers: workers.map_or(base.workers, usize::from),
        deadline: deadline_secs.map_or(base.deadline, Duration::from_secs),
        source: file.unwrap_or_else(|| base.source.clone()),
    }
}
