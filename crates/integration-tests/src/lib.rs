//! Integration tests for Sika.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sika-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `ingest_pipeline` - End-to-end bulk ingestion against the in-memory store
//! - `user_routes` - HTTP API through the full router
//!
//! The helpers below build fixtures shared by both suites.

use std::path::PathBuf;

use sika_core::{Address, User, UserId};

/// Build a user with one address.
///
/// # Panics
///
/// Panics if `id` is blank.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sample_user(id: &str, name: &str) -> User {
    User {
        id: UserId::parse(id).expect("fixture ids are non-empty"),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone_number: "+1 555 0100".to_string(),
        addresses: vec![Address {
            street: format!("{name} Street 1"),
            city: "Lisbon".to_string(),
            state: "Lisboa".to_string(),
            zip_code: "1100-148".to_string(),
            country: "PT".to_string(),
        }],
    }
}

/// A JSON bulk source written to the system temp directory.
///
/// The file is removed when this value is dropped.
pub struct BatchFile {
    path: PathBuf,
}

impl BatchFile {
    /// Write `users` as a JSON array.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn from_users(users: &[User]) -> Self {
        let json = serde_json::to_string_pretty(users).expect("users serialize");
        Self::from_raw(&json)
    }

    /// Write raw contents, valid JSON or not.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn from_raw(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("sika-batch-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).expect("temp file is writable");
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for BatchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
