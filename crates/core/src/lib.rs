//! Sika Core - Shared record types.
//!
//! This crate provides the types used across all Sika components:
//! - `server` - Record store, services, ingestion pipeline and HTTP API
//! - `cli` - The `sika` binary (serve, ingest, migrate)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - The `User`/`Address` records and the type-safe `UserId`

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
