//! In-memory user store.
//!
//! Used by tests and by `SIKA_STORE=memory` for local runs. Enforces the same
//! unique-id rule as the `PostgreSQL` store: the first create for an id wins,
//! later ones fail with `Conflict`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::RwLock;

use sika_core::{User, UserId};

use super::{RepositoryError, UserStore};

/// User store kept in process memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether the store holds no users.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        match users.entry(user.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "user {} already exists",
                user.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn get(&self, id: &UserId) -> Result<User, RepositoryError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
