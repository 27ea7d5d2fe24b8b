//! Batch loader.
//!
//! Decodes a bulk source into a fully materialized, ordered `Vec<User>`.
//! Decoding is all-or-nothing: one malformed record rejects the whole batch.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use sika_core::User;

/// Errors that can occur while loading a batch.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source is not a well-formed JSON array of users.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a batch of users from any reader.
///
/// # Errors
///
/// Returns `serde_json::Error` if the input is not a JSON array of users.
pub fn decode_batch<R: Read>(reader: R) -> Result<Vec<User>, serde_json::Error> {
    serde_json::from_reader(std::io::BufReader::new(reader))
}

/// Load a batch of users from a JSON file.
///
/// The file is read on the blocking pool and closed before this returns,
/// whether decoding succeeds or not.
///
/// # Errors
///
/// Returns `LoadError::Io` if the file cannot be opened or read, and
/// `LoadError::Decode` if its contents are malformed.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_batch(path: impl AsRef<Path>) -> Result<Vec<User>, LoadError> {
    let path = path.as_ref().to_path_buf();
    let task_path = path.clone();

    let users = tokio::task::spawn_blocking(move || load_batch_blocking(&task_path))
        .await
        .map_err(|e| LoadError::Io {
            path,
            source: std::io::Error::other(e),
        })??;

    info!(count = users.len(), "Loaded batch");
    Ok(users)
}

fn load_batch_blocking(path: &Path) -> Result<Vec<User>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode_batch(file).map_err(|source| {
        if source.is_io() {
            LoadError::Io {
                path: path.to_path_buf(),
                source: source.into(),
            }
        } else {
            LoadError::Decode {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
