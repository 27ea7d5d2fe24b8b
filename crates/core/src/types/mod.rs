//! Core types for Sika.
//!
//! This module provides the persisted record shapes and their identifiers.

pub mod id;
pub mod user;

pub use id::{UserId, UserIdError};
pub use user::{Address, User};
