//! User service.
//!
//! The seam that the HTTP handlers and the ingestion pipeline depend on. The
//! store-backed implementation only delegates; it adds tracing spans and
//! nothing else.

use std::future::Future;

use tracing::instrument;

use sika_core::{User, UserId};

use crate::db::{RepositoryError, UserStore};

/// Create and read operations on user records.
pub trait UserService: Send + Sync {
    /// Create a user, returning the persisted record.
    fn create(&self, user: User) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Fetch a user. A missing record is `RepositoryError::NotFound`.
    fn get(&self, id: &UserId) -> impl Future<Output = Result<User, RepositoryError>> + Send;
}

/// [`UserService`] that delegates to a [`UserStore`].
#[derive(Debug, Clone)]
pub struct StoreUserService<S> {
    store: S,
}

impl<S: UserStore> StoreUserService<S> {
    /// Create a new user service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: UserStore> UserService for StoreUserService<S> {
    #[instrument(skip_all, fields(user_id = %user.id))]
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        self.store.create(user).await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &UserId) -> Result<User, RepositoryError> {
        self.store.get(id).await
    }
}
