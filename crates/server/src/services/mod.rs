//! Business logic layer.
//!
//! - [`users`] - Pass-through user service over a [`crate::db::UserStore`]
//! - [`ingest`] - Bulk loading and the concurrent ingestion pipeline

pub mod ingest;
pub mod users;

pub use users::{StoreUserService, UserService};
