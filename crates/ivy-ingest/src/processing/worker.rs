//! Parsing worker: turns one job's PDF bytes into committed chunks

use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ChunkingConfig, ProcessingConfig};
use crate::error::Error;
use crate::ingestion::{DocumentExtractor, ExtractionError, PageText, TextChunker};
use crate::storage::JobRegistry;
use crate::types::{Job, JobId, JobStatus};

/// Progress reported once the document is open
const PROGRESS_OPENED: u64 = 5;
/// Progress reported once every page has been read
const PROGRESS_EXTRACTED: u64 = 90;

/// One unit of work handed to a worker
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub job_id: JobId,
    pub data: Bytes,
    /// Bumped by the scheduler on every re-dispatch of the same job
    pub generation: u32,
    /// The job is already running and is being handed to a fresh worker
    pub redispatch: bool,
    pub cancel: CancellationToken,
    /// Wall-clock ceiling fixed when the job first reached a worker; shared
    /// by every re-dispatch. `None` starts the clock at `run`.
    pub deadline: Option<Instant>,
}

/// How a dispatch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Job completed with this many chunks
    Completed { chunks: usize },
    /// Job failed with this message
    Failed(String),
    /// Cancellation observed; the canceller owns the job record
    Cancelled,
    /// The job was not claimable (already terminal, purged, or re-dispatched)
    Skipped,
}

/// Executes the PDF-to-chunks transformation for one job at a time
pub struct ParsingWorker {
    registry: Arc<dyn JobRegistry>,
    extractor: Arc<dyn DocumentExtractor>,
    chunker: TextChunker,
    config: ProcessingConfig,
}

impl ParsingWorker {
    /// Create a new parsing worker
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        extractor: Arc<dyn DocumentExtractor>,
        chunking: &ChunkingConfig,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            registry,
            extractor,
            chunker: TextChunker::from_config(chunking),
            config,
        }
    }

    /// Run one dispatch to a terminal state (or until cancelled)
    pub async fn run(&self, dispatch: Dispatch) -> WorkerOutcome {
        let job_id = dispatch.job_id.clone();

        if !self.claim(&dispatch) {
            return WorkerOutcome::Skipped;
        }

        tracing::info!(
            "Parsing job {} ({} bytes, extractor: {}, attempt {})",
            job_id,
            dispatch.data.len(),
            self.extractor.name(),
            dispatch.generation + 1
        );
        let start_time = Instant::now();

        let job_timeout = self.config.job_timeout();
        let deadline = dispatch.deadline.unwrap_or(start_time + job_timeout);
        let result = match timeout_at(deadline, self.process(&dispatch)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "TIMEOUT parsing job {} after {:.1}s in this attempt (limit: {}s per job)",
                    job_id,
                    start_time.elapsed().as_secs_f64(),
                    job_timeout.as_secs()
                );
                // Stop the abandoned extraction at its next checkpoint
                dispatch.cancel.cancel();
                Err(ExtractionError::Timeout)
            }
        };

        match result {
            Ok(job) => {
                tracing::info!(
                    "Job {} completed in {:.1}s: {}",
                    job_id,
                    start_time.elapsed().as_secs_f64(),
                    job.message
                );
                WorkerOutcome::Completed {
                    chunks: job.chunk_ids.len(),
                }
            }
            Err(ExtractionError::Cancelled) => {
                tracing::info!("Job {} cancelled, worker stopped", job_id);
                WorkerOutcome::Cancelled
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Job {} failed: {}", job_id, message);
                self.fail(&job_id, &message);
                WorkerOutcome::Failed(message)
            }
        }
    }

    /// Move the job to running, or take over a job that still is for a
    /// re-dispatch. Either way the heartbeat starts fresh.
    fn claim(&self, dispatch: &Dispatch) -> bool {
        let job_id = &dispatch.job_id;

        if dispatch.redispatch {
            return match self.registry.get(job_id) {
                Ok(job) if job.status == JobStatus::Running => self
                    .report(job_id, job.progress, "resumed after re-dispatch".to_string())
                    .is_ok(),
                Ok(job) => {
                    tracing::debug!("Re-dispatch of job {} skipped, job is {}", job_id, job.status);
                    false
                }
                Err(e) => {
                    tracing::debug!("Re-dispatch of job {} skipped: {}", job_id, e);
                    false
                }
            };
        }

        match self.registry.transition(
            job_id,
            JobStatus::Running,
            Some(0),
            Some("opening document".to_string()),
        ) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Could not claim job {}: {}", job_id, e);
                false
            }
        }
    }

    fn fail(&self, job_id: &JobId, message: &str) {
        match self
            .registry
            .transition(job_id, JobStatus::Failed, None, Some(message.to_string()))
        {
            Ok(_) => {}
            Err(Error::InvalidTransition { from, .. }) => {
                tracing::debug!("Job {} already {}, failure not recorded", job_id, from);
            }
            Err(e) => tracing::error!("Failed to record failure of job {}: {}", job_id, e),
        }
    }

    /// Extract, chunk and commit
    async fn process(&self, dispatch: &Dispatch) -> Result<Job, ExtractionError> {
        let job_id = &dispatch.job_id;
        let pages = self.extract_with_retry(dispatch).await?;

        checkpoint(&dispatch.cancel)?;
        self.report(job_id, PROGRESS_EXTRACTED as u8, "chunking text".to_string())?;

        let chunks = self.chunker.chunk_pages(job_id, &pages);
        if chunks.is_empty() {
            return Err(ExtractionError::NoText(format!(
                "no text found on any of {} pages",
                pages.len()
            )));
        }

        checkpoint(&dispatch.cancel)?;
        let message = format!("parsed {} pages into {} chunks", pages.len(), chunks.len());
        self.registry
            .complete(job_id, chunks, Some(message))
            .map_err(lost_claim)
    }

    /// Retry transient extraction failures with exponential backoff
    async fn extract_with_retry(
        &self,
        dispatch: &Dispatch,
    ) -> Result<Vec<PageText>, ExtractionError> {
        let mut attempt = 0;
        loop {
            match self.extract(dispatch).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Job {} extraction attempt {} failed ({}), retrying in {}ms",
                        dispatch.job_id,
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = dispatch.cancel.cancelled() => return Err(ExtractionError::Cancelled),
                    }
                }
                other => return other,
            }
        }
    }

    /// Open the document and read it page by page, off the async runtime
    async fn extract(&self, dispatch: &Dispatch) -> Result<Vec<PageText>, ExtractionError> {
        let job_id = &dispatch.job_id;

        let extractor = Arc::clone(&self.extractor);
        let data = dispatch.data.clone();
        let mut source = run_blocking(move || extractor.open(&data)).await?;

        let page_count = source.page_count();
        self.registry
            .record_page_count(job_id, page_count)
            .map_err(lost_claim)?;
        tracing::debug!("Job {} opened: {} pages", job_id, page_count);

        let mut pages = Vec::with_capacity(page_count as usize);
        for page_number in 1..=page_count {
            checkpoint(&dispatch.cancel)?;

            let span = PROGRESS_EXTRACTED - PROGRESS_OPENED;
            let progress = PROGRESS_OPENED + u64::from(page_number - 1) * span / u64::from(page_count);
            self.report(
                job_id,
                progress as u8,
                format!("extracting page {}/{}", page_number, page_count),
            )?;

            let (returned, text) = run_blocking(move || {
                let text = source.page_text(page_number)?;
                Ok((source, text))
            })
            .await?;
            source = returned;

            pages.push(PageText { page_number, text });
        }

        Ok(pages)
    }

    /// Progress checkpoint; doubles as the heartbeat the watchdog looks for
    fn report(&self, job_id: &JobId, progress: u8, message: String) -> Result<(), ExtractionError> {
        self.registry
            .transition(job_id, JobStatus::Running, Some(progress), Some(message))
            .map(|_| ())
            .map_err(lost_claim)
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), ExtractionError> {
    if cancel.is_cancelled() {
        Err(ExtractionError::Cancelled)
    } else {
        Ok(())
    }
}

/// A registry write was refused because the job left `running` underneath the
/// worker (cancelled, failed by the watchdog, or purged)
fn lost_claim(e: Error) -> ExtractionError {
    match e {
        Error::InvalidTransition { .. } | Error::InvalidState { .. } | Error::NotFound(_) => {
            tracing::debug!("Worker lost its claim: {}", e);
            ExtractionError::Cancelled
        }
        other => ExtractionError::Transient(other.to_string()),
    }
}

/// Run extractor code on the blocking pool; a panic there is transient
async fn run_blocking<T, F>(f: F) -> Result<T, ExtractionError>
where
    F: FnOnce() -> Result<T, ExtractionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        if e.is_panic() {
            ExtractionError::Transient("extraction task panicked".to_string())
        } else {
            ExtractionError::Transient("extraction task was aborted".to_string())
        }
    })?
}
