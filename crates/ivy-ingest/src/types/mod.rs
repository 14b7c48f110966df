//! Core types for jobs and chunks

pub mod chunk;
pub mod job;

pub use chunk::{ByteRange, Chunk, ChunkSummary, PageRange};
pub use job::{Job, JobId, JobMetadata, JobStatus};
