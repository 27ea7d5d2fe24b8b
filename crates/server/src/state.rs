//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::Store;
use crate::services::StoreUserService;

/// The user service the HTTP layer talks to.
pub type Users = StoreUserService<Store>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the user service and its backing store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    users: Arc<Users>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(users: Arc<Users>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { users }),
        }
    }

    /// Build state directly over a store.
    #[must_use]
    pub fn from_store(store: Store) -> Self {
        Self::new(Arc::new(StoreUserService::new(store)))
    }

    /// Get a reference to the user service.
    #[must_use]
    pub fn users(&self) -> &Users {
        &self.inner.users
    }

    /// Get a reference to the backing record store.
    #[must_use]
    pub fn store(&self) -> &Store {
        self.inner.users.store()
    }
}
