//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sika migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SIKA_DATABASE_URL` - `PostgreSQL` connection string (or `DATABASE_URL`)
//!
//! Migration files live in `crates/server/migrations/`. With
//! `SIKA_STORE=memory` there is nothing to migrate.

use sika_server::config::AppConfig;
use sika_server::db::Store;

use super::CommandError;

/// Apply all pending migrations to the configured store.
///
/// # Errors
///
/// Returns an error if the store cannot be reached or a migration fails.
pub async fn run(config: &AppConfig) -> Result<(), CommandError> {
    tracing::info!("Connecting to record store...");
    let store = Store::connect(&config.store).await?;

    tracing::info!("Running migrations...");
    store.migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
