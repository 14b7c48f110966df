//! Per-job chunk storage with staged writes

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, JobId};

#[derive(Debug, Default)]
struct ChunkSet {
    chunks: Vec<Chunk>,
    committed: bool,
}

/// Ordered chunks per job.
///
/// Chunks are appended into a staging set while the job runs and only become
/// readable once committed, which happens together with the job's transition
/// to completed. Staged chunks of a failed job are discarded.
#[derive(Debug, Default)]
pub struct ChunkStore {
    sets: DashMap<JobId, ChunkSet>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage chunks for a job. Indices must continue the staged sequence.
    pub fn append(&self, job_id: &JobId, chunks: Vec<Chunk>) -> Result<usize> {
        let mut set = self.sets.entry(job_id.clone()).or_default();

        if set.committed {
            return Err(Error::invalid_state(job_id, "chunks already committed"));
        }

        let mut expected = set.chunks.len() as u32;
        for chunk in &chunks {
            if &chunk.job_id != job_id {
                return Err(Error::invalid_state(
                    job_id,
                    format!("chunk {} belongs to job {}", chunk.chunk_id, chunk.job_id),
                ));
            }
            if chunk.sequence_index != expected {
                return Err(Error::invalid_state(
                    job_id,
                    format!(
                        "expected sequence index {}, got {}",
                        expected, chunk.sequence_index
                    ),
                ));
            }
            expected += 1;
        }

        set.chunks.extend(chunks);
        Ok(set.chunks.len())
    }

    /// Freeze the staged set and return its chunk ids in order
    pub fn commit(&self, job_id: &JobId) -> Result<Vec<Uuid>> {
        let mut set = self
            .sets
            .get_mut(job_id)
            .ok_or_else(|| Error::invalid_state(job_id, "no chunks staged"))?;

        if set.chunks.is_empty() {
            return Err(Error::invalid_state(job_id, "no chunks staged"));
        }

        set.committed = true;
        Ok(set.chunks.iter().map(|c| c.chunk_id).collect())
    }

    /// Drop staged chunks; committed sets are left alone
    pub fn discard(&self, job_id: &JobId) {
        self.sets.remove_if(job_id, |_, set| !set.committed);
    }

    /// Committed chunks for a job, in sequence order
    pub fn committed(&self, job_id: &JobId) -> Option<Vec<Chunk>> {
        self.sets
            .get(job_id)
            .filter(|set| set.committed)
            .map(|set| set.chunks.clone())
    }

    pub fn staged_len(&self, job_id: &JobId) -> usize {
        self.sets
            .get(job_id)
            .filter(|set| !set.committed)
            .map(|set| set.chunks.len())
            .unwrap_or(0)
    }

    pub fn remove(&self, job_id: &JobId) {
        self.sets.remove(job_id);
    }
}
