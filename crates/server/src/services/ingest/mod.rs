//! Bulk ingestion.
//!
//! [`loader`] turns a JSON source into a `Vec<User>`; [`pipeline`] fans that
//! batch out to a fixed pool of workers calling
//! [`UserService::create`](crate::services::UserService::create).

pub mod loader;
pub mod pipeline;

pub use loader::{LoadError, decode_batch, load_batch};
pub use pipeline::{Completion, FailedRecord, IngestPipeline, IngestReport, PipelineState};
