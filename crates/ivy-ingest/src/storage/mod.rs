//! Job and chunk storage
//!
//! The registry is consumed through the [`JobRegistry`] trait so the
//! scheduler and workers do not depend on where records live.

mod chunk_store;
mod registry;

pub use chunk_store::ChunkStore;
pub use registry::{InMemoryJobRegistry, JobRegistry};
