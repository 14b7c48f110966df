//! ivy-ingest: asynchronous PDF ingestion service
//!
//! Uploads are admitted by the [`processing::JobScheduler`], parsed page by
//! page on a bounded worker pool and committed as ordered chunks. Clients
//! poll job status through [`status::StatusApi`] and fetch the chunks once the
//! job completes.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod server;
pub mod status;
pub mod storage;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use types::{Chunk, ChunkSummary, Job, JobId, JobStatus};
