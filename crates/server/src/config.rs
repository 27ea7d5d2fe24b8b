//! Sika configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SIKA_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; only required when `SIKA_STORE=postgres`)
//!
//! ## Optional
//! - `SIKA_STORE` - Record store backend, `postgres` or `memory` (default: postgres)
//! - `SIKA_HOST` - Bind address (default: 127.0.0.1)
//! - `SIKA_PORT` - Listen port (default: 8080)
//! - `SIKA_INGEST_WORKERS` - Ingestion worker count (default: 10)
//! - `SIKA_INGEST_DEADLINE_SECS` - Overall ingestion deadline (default: 120)
//! - `SIKA_INGEST_SOURCE` - Bulk source file (default: `users_data.json`)
//! - `SIKA_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const DEFAULT_INGEST_WORKERS: &str = "10";
const DEFAULT_INGEST_DEADLINE_SECS: &str = "120";
const DEFAULT_INGEST_SOURCE: &str = "users_data.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Application configuration, built once at start-up and passed down.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Which record store backs the service
    pub store: StoreConfig,
    /// Bulk ingestion settings
    pub ingest: IngestConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Record store backend selection.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// `PostgreSQL` via sqlx.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// Process-local map. Contents are lost on exit.
    Memory,
}

/// Bulk ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Number of concurrent workers (at least 1)
    pub workers: usize,
    /// Overall deadline for one ingestion run
    pub deadline: Duration,
    /// Path of the JSON bulk source
    pub source: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            deadline: Duration::from_secs(120),
            source: PathBuf::from(DEFAULT_INGEST_SOURCE),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host: IpAddr = env.parse_or("SIKA_HOST", DEFAULT_HOST)?;
        let port: u16 = env.parse_or("SIKA_PORT", DEFAULT_PORT)?;
        let store = StoreConfig::from_env(&env)?;
        let ingest = IngestConfig::from_env(&env)?;
        let log_format: LogFormat = env.parse_or("SIKA_LOG_FORMAT", "text")?;

        Ok(Self {
            host,
            port,
            store,
            ingest,
            log_format,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StoreConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let backend = env.or_default("SIKA_STORE", "postgres");
        match backend.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres {
                database_url: get_database_url(env, "SIKA_DATABASE_URL")?,
            }),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidEnvVar(
                "SIKA_STORE".to_string(),
                format!("unknown store '{other}' (expected postgres or memory)"),
            )),
        }
    }
}

impl IngestConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let workers: usize = env.parse_or("SIKA_INGEST_WORKERS", DEFAULT_INGEST_WORKERS)?;
        if workers == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SIKA_INGEST_WORKERS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let deadline_secs: u64 =
            env.parse_or("SIKA_INGEST_DEADLINE_SECS", DEFAULT_INGEST_DEADLINE_SECS)?;
        if deadline_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SIKA_INGEST_DEADLINE_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            workers,
            deadline: Duration::from_secs(deadline_secs),
            source: PathBuf::from(env.or_default("SIKA_INGEST_SOURCE", DEFAULT_INGEST_SOURCE)),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
    primary_key: &str,
) -> Result<SecretString, ConfigError> {
    env.optional(primary_key)
        .or_else(|| env.optional("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}
