//! Sika server library.
//!
//! Record storage, the user service, the bulk ingestion pipeline and the
//! HTTP API. The `sika` binary in the `cli` crate wires these together.
//!
//! # Architecture
//!
//! ```text
//! load_batch ──► IngestPipeline ──► UserService ──► UserStore (Postgres | memory)
//!                                        ▲
//!                     GET /{id} ─────────┘
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with tracing and Sentry layers.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Serve the HTTP API on `addr` until `shutdown` completes.
///
/// In-flight requests are allowed to finish after the signal.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound or the server fails.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("sika listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}
