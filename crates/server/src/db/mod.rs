//! Record storage.
//!
//! # Database: `sika`
//!
//! ## Tables
//!
//! - `sika.user` - User records keyed by their caller-supplied id
//! - `sika.address` - Addresses, each owned by exactly one user
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p sika-cli -- migrate
//! ```
//!
//! # Backends
//!
//! [`UserStore`] is the seam the service layer depends on. [`Store`] selects
//! between the `PostgreSQL` and in-memory implementations at start-up.

pub mod memory;
pub mod users;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sika_core::{User, UserId};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::StoreConfig;

pub use memory::MemoryUserStore;
pub use users::PgUserStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate user id).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Durable keyed storage for users and their addresses.
pub trait UserStore: Send + Sync {
    /// Persist a new user with all of its addresses.
    ///
    /// Returns `RepositoryError::Conflict` if the id is already taken.
    fn create(&self, user: User) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Fetch a user and its addresses.
    ///
    /// Returns `RepositoryError::NotFound` if no user has this id.
    fn get(&self, id: &UserId) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// The record store selected at start-up.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(PgUserStore),
    Memory(MemoryUserStore),
}

impl Store {
    /// Open the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the `PostgreSQL` pool cannot be created.
    pub async fn connect(config: &StoreConfig) -> Result<Self, sqlx::Error> {
        match config {
            StoreConfig::Postgres { database_url } => {
                let pool = create_pool(database_url).await?;
                tracing::info!("Database pool created");
                Ok(Self::Postgres(PgUserStore::new(pool)))
            }
            StoreConfig::Memory => {
                tracing::warn!("Using in-memory record store; records are lost on exit");
                Ok(Self::Memory(MemoryUserStore::new()))
            }
        }
    }

    /// Run pending migrations. A no-op for the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError` if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        match self {
            Self::Postgres(store) => migrate(store.pool()).await,
            Self::Memory(_) => Ok(()),
        }
    }
}

impl UserStore for Store {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        match self {
            Self::Postgres(store) => store.create(user).await,
            Self::Memory(store) => store.create(user).await,
        }
    }

    async fn get(&self, id: &UserId) -> Result<User, RepositoryError> {
        match self {
            Self::Postgres(store) => store.get(id).await,
            Self::Memory(store) => store.get(id).await,
        }
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(store) => store.ping().await,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the migrations in `crates/server/migrations/`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
