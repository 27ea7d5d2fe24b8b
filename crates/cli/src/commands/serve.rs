//! Serve the read API.
//!
//! # Usage
//!
//! ```bash
//! sika serve
//! sika serve --migrate
//! ```

use sika_server::config::AppConfig;
use sika_server::db::Store;
use sika_server::state::AppState;

use super::CommandError;
use crate::telemetry::shutdown_signal;

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the store cannot be reached, migrations fail, or the
/// listener cannot be bound.
pub async fn run(config: &AppConfig, migrate: bool) -> Result<(), CommandError> {
    let store = Store::connect(&config.store).await?;

    if migrate {
        store.migrate().await?;
        tracing::info!("Migrations applied");
    } else {
        // NOTE: Migrations are NOT run automatically on startup.
        // Run them explicitly via: sika migrate (or pass --migrate)
        tracing::debug!("Skipping migrations");
    }

    let state = AppState::from_store(store);
    sika_server::serve(config.socket_addr(), state, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}
