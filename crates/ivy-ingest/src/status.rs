//! Read-only per-job queries polled by clients

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::storage::JobRegistry;
use crate::types::{ChunkSummary, Job, JobId, JobStatus};

/// Public view of a job's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
        }
    }
}

/// Query surface over the job registry. Never blocks on workers.
#[derive(Clone)]
pub struct StatusApi {
    registry: Arc<dyn JobRegistry>,
}

impl StatusApi {
    pub fn new(registry: Arc<dyn JobRegistry>) -> Self {
        Self { registry }
    }

    /// Latest status snapshot
    pub fn query_status(&self, job_id: &JobId) -> Result<JobStatusView> {
        let job = self.registry.get(job_id)?;
        Ok(JobStatusView::from(&job))
    }

    /// Chunks of a completed job in document order; `NotReady` before that
    pub fn query_chunks(&self, job_id: &JobId) -> Result<Vec<ChunkSummary>> {
        let mut chunks = self.registry.chunks(job_id)?;
        chunks.sort_by_key(|c| c.sequence_index);
        Ok(chunks.iter().map(ChunkSummary::from).collect())
    }

    /// Chunks matching a snapshot: empty unless it is completed. A job purged
    /// since the snapshot was taken also yields no chunks.
    pub fn completed_chunks(&self, view: &JobStatusView) -> Result<Vec<ChunkSummary>> {
        if view.status != JobStatus::Completed {
            return Ok(Vec::new());
        }
        match self.query_chunks(&view.job_id) {
            Err(Error::NotFound(_)) => {
                tracing::debug!("Job {} purged before its chunks were read", view.job_id);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Poll the snapshot until the job is terminal or `deadline` passes,
    /// returning the last snapshot either way
    pub async fn wait_for_terminal(
        &self,
        job_id: &JobId,
        poll: Duration,
        deadline: Instant,
    ) -> Result<JobStatusView> {
        loop {
            let view = self.query_status(job_id)?;
            if view.status.is_terminal() || Instant::now() >= deadline {
                return Ok(view);
            }
            tokio::time::sleep_until((Instant::now() + poll).min(deadline)).await;
        }
    }
}
