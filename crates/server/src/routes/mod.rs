//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (pings the record store)
//! GET  /{id}                   - Fetch a user and its addresses
//! ```

pub mod health;
pub mod users;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/{id}", get(users::get_user))
}
