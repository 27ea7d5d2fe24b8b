//! Subcommand implementations.

pub mod ingest;
pub mod migrate;
pub mod serve;

use thiserror::Error;

use sika_server::services::ingest::LoadError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The bulk source could not be loaded.
    #[error("Ingestion aborted: {0}")]
    Load(#[from] LoadError),

    /// The HTTP server failed.
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}
