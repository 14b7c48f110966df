//! Job registry: the authoritative table of job records

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use super::ChunkStore;
use crate::error::{Error, Result};
use crate::types::{Chunk, Job, JobId, JobMetadata, JobStatus};

/// Store of job records.
///
/// Every operation is atomic with respect to a single job. Implementations
/// must not serialize operations on different jobs behind one lock.
pub trait JobRegistry: Send + Sync {
    /// Insert a pending job and return its new id
    fn create(&self, metadata: JobMetadata) -> Result<JobId>;

    /// Snapshot of a job
    fn get(&self, job_id: &JobId) -> Result<Job>;

    /// Move a job through the state machine.
    ///
    /// `Running -> Running` updates progress/message only. Progress never
    /// decreases while running, is forced to 100 on completion and is frozen
    /// on failure.
    fn transition(
        &self,
        job_id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<String>,
    ) -> Result<Job>;

    /// Stage chunks for a running job, in sequence order
    fn append_chunks(&self, job_id: &JobId, chunks: Vec<Chunk>) -> Result<usize>;

    /// Append the final chunks and complete the job in one step
    fn complete(&self, job_id: &JobId, chunks: Vec<Chunk>, message: Option<String>) -> Result<Job>;

    /// Record the page count once the document has been opened
    fn record_page_count(&self, job_id: &JobId, page_count: u32) -> Result<()>;

    /// Committed chunks of a completed job
    fn chunks(&self, job_id: &JobId) -> Result<Vec<Chunk>>;

    /// Remove terminal jobs last updated before `cutoff`, with their chunks
    fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> usize;
}

/// In-memory registry backed by a sharded map of per-job mutexes
pub struct InMemoryJobRegistry {
    jobs: DashMap<JobId, Arc<Mutex<Job>>>,
    chunk_store: Arc<ChunkStore>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::with_chunk_store(Arc::new(ChunkStore::new()))
    }

    pub fn with_chunk_store(chunk_store: Arc<ChunkStore>) -> Self {
        Self {
            jobs: DashMap::new(),
            chunk_store,
        }
    }

    pub fn chunk_store(&self) -> &Arc<ChunkStore> {
        &self.chunk_store
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Clone the job's lock handle so the map shard is released before locking
    fn entry(&self, job_id: &JobId) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .get(job_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::NotFound(job_id.to_string()))
    }

    fn apply(
        &self,
        job: &mut Job,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<String>,
    ) -> Result<()> {
        let from = job.status;
        if !from.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                job_id: job.job_id.to_string(),
                from,
                to: status,
            });
        }

        match status {
            JobStatus::Running => {
                if let Some(p) = progress {
                    job.progress = job.progress.max(p.min(100));
                }
            }
            JobStatus::Completed => {
                let chunk_ids = self.chunk_store.commit(&job.job_id)?;
                job.chunk_ids = chunk_ids;
                job.progress = 100;
            }
            JobStatus::Failed => {
                self.chunk_store.discard(&job.job_id);
            }
            JobStatus::Pending => {}
        }

        job.status = status;
        if let Some(message) = message {
            job.message = message;
        }
        job.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for InMemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, metadata: JobMetadata) -> Result<JobId> {
        loop {
            let job_id = JobId::generate();
            let entry = self.jobs.entry(job_id.clone());
            if let dashmap::mapref::entry::Entry::Vacant(vacant) = entry {
                vacant.insert(Arc::new(Mutex::new(Job::new(job_id.clone(), metadata))));
                return Ok(job_id);
            }
        }
    }

    fn get(&self, job_id: &JobId) -> Result<Job> {
        let entry = self.entry(job_id)?;
        let job = entry.lock().clone();
        Ok(job)
    }

    fn transition(
        &self,
        job_id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        message: Option<String>,
    ) -> Result<Job> {
        let entry = self.entry(job_id)?;
        let mut job = entry.lock();
        self.apply(&mut job, status, progress, message)?;
        Ok(job.clone())
    }

    fn append_chunks(&self, job_id: &JobId, chunks: Vec<Chunk>) -> Result<usize> {
        let entry = self.entry(job_id)?;
        let job = entry.lock();
        if job.status != JobStatus::Running {
            return Err(Error::invalid_state(
                job_id,
                format!("chunks can only be appended while running, job is {}", job.status),
            ));
        }
        self.chunk_store.append(job_id, chunks)
    }

    fn complete(&self, job_id: &JobId, chunks: Vec<Chunk>, message: Option<String>) -> Result<Job> {
        let entry = self.entry(job_id)?;
        let mut job = entry.lock();
        if job.status != JobStatus::Running {
            return Err(Error::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: JobStatus::Completed,
            });
        }
        if let Err(e) = self.chunk_store.append(job_id, chunks) {
            self.chunk_store.discard(job_id);
            return Err(e);
        }
        self.apply(&mut job, JobStatus::Completed, None, message)?;
        Ok(job.clone())
    }

    fn record_page_count(&self, job_id: &JobId, page_count: u32) -> Result<()> {
        let entry = self.entry(job_id)?;
        let mut job = entry.lock();
        if job.status != JobStatus::Running {
            return Err(Error::invalid_state(job_id, "page count can only be recorded while running"));
        }
        job.page_count = Some(page_count);
        job.updated_at = Utc::now();
        Ok(())
    }

    fn chunks(&self, job_id: &JobId) -> Result<Vec<Chunk>> {
        let entry = self.entry(job_id)?;
        let job = entry.lock();
        if job.status != JobStatus::Completed {
            return Err(Error::NotReady {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        self.chunk_store
            .committed(job_id)
            .ok_or_else(|| Error::invalid_state(job_id, "completed job has no committed chunks"))
    }

    fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut purged = Vec::new();
        self.jobs.retain(|job_id, entry| {
            let job = entry.lock();
            let expired = job.status.is_terminal() && job.updated_at < cutoff;
            if expired {
                purged.push(job_id.clone());
            }
            !expired
        });

        for job_id in &purged {
            self.chunk_store.remove(job_id);
        }

        if !purged.is_empty() {
            tracing::info!("Purged {} expired jobs", purged.len());
        }
        purged.len()
    }
}
