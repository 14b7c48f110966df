//! Job scheduler: admission, bounded dispatch, stall recovery and retention
//!
//! Capacity is `workers` running jobs plus `queue_capacity` jobs waiting in a
//! bounded FIFO channel. The dispatcher only pulls from the channel once it
//! holds a worker permit, so a full channel really means a full pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::worker::{Dispatch, ParsingWorker, WorkerOutcome};
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::DocumentExtractor;
use crate::storage::JobRegistry;
use crate::types::{Job, JobId, JobMetadata, JobStatus};

/// The only media type the pipeline accepts
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Client-supplied description of an upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub original_filename: String,
    /// Size the client claims; the received byte count is authoritative
    pub declared_size: Option<u64>,
    pub mime_type: String,
}

/// Aggregate scheduler counters
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Jobs admitted but not yet picked up by a worker
    pub queued: usize,
    /// Jobs currently held by a worker
    pub running: usize,
}

/// Scheduler-side record of an admitted, non-terminal job
struct InFlight {
    data: Bytes,
    cancel: CancellationToken,
    generation: u32,
    redispatches: u32,
    /// Set while a worker holds the current generation; queued jobs have none
    started_at: Option<DateTime<Utc>>,
    /// Fixed on the first start and kept across re-dispatches
    deadline: Option<Instant>,
}

struct Inner {
    config: IngestConfig,
    registry: Arc<dyn JobRegistry>,
    worker: Arc<ParsingWorker>,
    sender: mpsc::Sender<Dispatch>,
    in_flight: DashMap<JobId, InFlight>,
    running: AtomicUsize,
    shutdown: CancellationToken,
}

/// Admits uploads and drives them through a fixed pool of parsing workers
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// Create the scheduler and spawn its dispatcher, watchdog and retention
    /// sweeper. Must be called from within a tokio runtime.
    pub fn start(
        config: IngestConfig,
        registry: Arc<dyn JobRegistry>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        let worker = Arc::new(ParsingWorker::new(
            Arc::clone(&registry),
            extractor,
            &config.chunking,
            config.processing.clone(),
        ));
        let (sender, receiver) = mpsc::channel(config.processing.queue_capacity);

        tracing::info!(
            "Job scheduler started: {} workers, queue capacity {}, {}s job timeout",
            config.processing.workers,
            config.processing.queue_capacity,
            config.processing.job_timeout_secs
        );

        let inner = Arc::new(Inner {
            config,
            registry,
            worker,
            sender,
            in_flight: DashMap::new(),
            running: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Arc::clone(&inner).dispatch_loop(receiver));
        tokio::spawn(Arc::clone(&inner).watchdog_loop());
        tokio::spawn(Arc::clone(&inner).retention_loop());

        Self { inner }
    }

    /// Validate an upload, create its job and enqueue it. Returns as soon as
    /// the job is admitted.
    pub fn submit(&self, data: Bytes, upload: UploadMetadata) -> Result<JobId> {
        let inner = &self.inner;

        if !is_pdf_mime(&upload.mime_type) {
            tracing::info!(
                "Rejected upload '{}': media type {}",
                upload.original_filename,
                upload.mime_type
            );
            return Err(Error::UnsupportedMediaType(upload.mime_type));
        }
        if data.is_empty() {
            return Err(Error::InvalidRequest("Uploaded PDF is empty".to_string()));
        }
        let limit = inner.config.server.max_upload_size;
        if data.len() as u64 > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
        if let Some(declared) = upload.declared_size {
            if declared != data.len() as u64 {
                tracing::warn!(
                    "Upload '{}' declared {} bytes but sent {}",
                    upload.original_filename,
                    declared,
                    data.len()
                );
            }
        }

        // Reserve the queue slot before creating the job so overflow leaves
        // no trace in the registry
        let permit = inner.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => Error::Overloaded {
                capacity: inner.config.processing.queue_capacity,
            },
            mpsc::error::TrySendError::Closed(()) => Error::internal("scheduler is shut down"),
        })?;

        let job_id = inner.registry.create(JobMetadata {
            original_filename: upload.original_filename,
            file_size_bytes: data.len() as u64,
            mime_type: PDF_MIME_TYPE.to_string(),
            content_sha256: content_hash(&data),
        })?;

        let cancel = inner.shutdown.child_token();
        inner.in_flight.insert(
            job_id.clone(),
            InFlight {
                data: data.clone(),
                cancel: cancel.clone(),
                generation: 0,
                redispatches: 0,
                started_at: None,
                deadline: None,
            },
        );
        permit.send(Dispatch {
            job_id: job_id.clone(),
            data,
            generation: 0,
            redispatch: false,
            cancel,
            deadline: None,
        });

        tracing::info!("Job {} queued", job_id);
        Ok(job_id)
    }

    /// Fail a pending or running job with message "cancelled" and signal its
    /// worker. Cancelling a terminal job is an `InvalidTransition`.
    pub fn cancel(&self, job_id: &JobId) -> Result<Job> {
        let job = self.inner.registry.transition(
            job_id,
            JobStatus::Failed,
            None,
            Some("cancelled".to_string()),
        )?;

        if let Some((_, in_flight)) = self.inner.in_flight.remove(job_id) {
            in_flight.cancel.cancel();
        }

        tracing::info!("Job {} cancelled", job_id);
        Ok(job)
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = &self.inner;
        let queue_capacity = inner.config.processing.queue_capacity;
        SchedulerStats {
            workers: inner.config.processing.workers,
            queue_capacity,
            queued: queue_capacity.saturating_sub(inner.sender.capacity()),
            running: inner.running.load(Ordering::SeqCst),
        }
    }

    /// Stop background loops and signal every in-flight worker
    pub fn shutdown(&self) {
        tracing::info!("Job scheduler shutting down");
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    async fn dispatch_loop(self: Arc<Self>, mut receiver: mpsc::Receiver<Dispatch>) {
        let semaphore = Arc::new(Semaphore::new(self.config.processing.workers));

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            let dispatch = tokio::select! {
                dispatch = receiver.recv() => match dispatch {
                    Some(dispatch) => dispatch,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            tokio::spawn(Arc::clone(&self).execute(dispatch, permit));
        }

        tracing::debug!("Dispatcher stopped");
    }

    /// Run one dispatch on a worker task while holding a pool permit
    async fn execute(self: Arc<Self>, mut dispatch: Dispatch, permit: OwnedSemaphorePermit) {
        let job_id = dispatch.job_id.clone();
        let generation = dispatch.generation;
        let cancel = dispatch.cancel.clone();

        if cancel.is_cancelled() {
            tracing::debug!("Job {} cancelled before dispatch", job_id);
            self.forget(&job_id, generation);
            return;
        }

        match self.start_held(&job_id, generation) {
            Some(deadline) => dispatch.deadline = Some(deadline),
            None => {
                tracing::debug!("Dispatch {} of job {} is stale, dropped", generation, job_id);
                return;
            }
        }

        self.running.fetch_add(1, Ordering::SeqCst);
        let worker = Arc::clone(&self.worker);
        let mut handle = tokio::spawn(async move { worker.run(dispatch).await });

        // A cancelled job gives its slot back right away; the detached worker
        // stops at its next checkpoint
        let joined = tokio::select! {
            biased;
            joined = &mut handle => Some(joined),
            _ = cancel.cancelled() => None,
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        drop(permit);

        match joined {
            Some(Ok(outcome)) => {
                if let WorkerOutcome::Failed(message) = &outcome {
                    tracing::debug!("Job {} dispatch ended in failure: {}", job_id, message);
                }
                self.forget(&job_id, generation);
            }
            Some(Err(e)) if e.is_panic() => {
                tracing::error!("Worker for job {} panicked", job_id);
                self.recover(&job_id, generation, "worker crashed");
            }
            Some(Err(e)) => {
                tracing::warn!("Worker for job {} did not finish: {}", job_id, e);
                self.forget(&job_id, generation);
            }
            None => self.forget(&job_id, generation),
        }
    }

    /// Mark the current generation as held by a worker and return the job's
    /// deadline, starting the clock on the first start
    fn start_held(&self, job_id: &JobId, generation: u32) -> Option<Instant> {
        let mut entry = self.in_flight.get_mut(job_id)?;
        if entry.generation != generation {
            return None;
        }
        entry.started_at = Some(Utc::now());
        let job_timeout = self.config.processing.job_timeout();
        Some(*entry.deadline.get_or_insert_with(|| Instant::now() + job_timeout))
    }

    /// Drop the in-flight record, unless a newer dispatch already replaced it
    fn forget(&self, job_id: &JobId, generation: u32) {
        self.in_flight
            .remove_if(job_id, |_, in_flight| in_flight.generation == generation);
    }

    /// Re-dispatch a stalled or crashed job, or fail it once the re-dispatch
    /// budget is spent
    fn recover(&self, job_id: &JobId, generation: u32, reason: &str) {
        let mut entry = match self.in_flight.get_mut(job_id) {
            Some(entry) if entry.generation == generation => entry,
            _ => return,
        };
        entry.cancel.cancel();

        if entry.redispatches >= self.config.processing.max_redispatch {
            drop(entry);
            self.in_flight.remove(job_id);
            tracing::error!("Job {}: {}, no re-dispatches left", job_id, reason);
            self.fail(job_id, format!("{}; retries exhausted", reason));
            return;
        }

        entry.redispatches += 1;
        entry.generation += 1;
        entry.cancel = self.shutdown.child_token();
        // Not held again until a worker picks the new dispatch up
        entry.started_at = None;
        let dispatch = Dispatch {
            job_id: job_id.clone(),
            data: entry.data.clone(),
            generation: entry.generation,
            redispatch: true,
            cancel: entry.cancel.clone(),
            deadline: entry.deadline,
        };
        let attempt = entry.redispatches;
        drop(entry);

        if let Err(e) = self.registry.transition(
            job_id,
            JobStatus::Running,
            None,
            Some(format!("re-dispatched after {}", reason)),
        ) {
            tracing::debug!("Job {} not re-dispatched: {}", job_id, e);
            self.in_flight.remove(job_id);
            return;
        }

        tracing::warn!("Job {}: {}, re-dispatch {}", job_id, reason, attempt);
        if let Err(e) = self.sender.try_send(dispatch) {
            tracing::error!("Job {} could not be re-dispatched: {}", job_id, e);
            self.in_flight.remove(job_id);
            self.fail(job_id, format!("{}; dispatch queue unavailable", reason));
        }
    }

    fn fail(&self, job_id: &JobId, message: String) {
        if let Err(e) = self
            .registry
            .transition(job_id, JobStatus::Failed, None, Some(message))
        {
            tracing::debug!("Job {} not failed by scheduler: {}", job_id, e);
        }
    }

    /// Look for worker-held jobs whose heartbeat is older than the window.
    /// Jobs waiting in the queue for a re-dispatch are never stalled.
    async fn watchdog_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.processing.watchdog_interval());
        let heartbeat = chrono::Duration::seconds(self.config.processing.heartbeat_secs as i64);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.cancelled() => break,
            }

            let now = Utc::now();
            let stalled: Vec<(JobId, u32)> = self
                .in_flight
                .iter()
                .filter_map(|entry| {
                    let started_at = entry.started_at?;
                    let job = self.registry.get(entry.key()).ok()?;
                    let last_beat = job.updated_at.max(started_at);
                    let stale = job.status == JobStatus::Running && now - last_beat > heartbeat;
                    stale.then(|| (entry.key().clone(), entry.generation))
                })
                .collect();

            for (job_id, generation) in stalled {
                tracing::warn!("Job {} missed its heartbeat", job_id);
                self.recover(&job_id, generation, "worker stalled");
            }
        }

        tracing::debug!("Watchdog stopped");
    }

    /// Purge terminal jobs past the retention window
    async fn retention_loop(self: Arc<Self>) {
        let retention = &self.config.retention;
        let mut interval = tokio::time::interval(retention.sweep_interval());
        let window = chrono::Duration::seconds(retention.retention_secs as i64);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.cancelled() => break,
            }

            let purged = self.registry.purge_terminal_before(Utc::now() - window);
            if purged > 0 {
                tracing::debug!("Retention sweep removed {} jobs", purged);
            }
        }

        tracing::debug!("Retention sweeper stopped");
    }
}

/// `application/pdf`, ignoring case and parameters
fn is_pdf_mime(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(PDF_MIME_TYPE))
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::ScriptedExtractor;
    use crate::storage::InMemoryJobRegistry;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn config(workers: usize, queue_capacity: usize) -> IngestConfig {
        let mut config = IngestConfig::default();
        config.processing.workers = workers;
        config.processing.queue_capacity = queue_capacity;
        config.processing.retry_backoff_ms = 1;
        config
    }

    fn start(
        config: IngestConfig,
        extractor: ScriptedExtractor,
    ) -> (JobScheduler, Arc<InMemoryJobRegistry>) {
        let registry = Arc::new(InMemoryJobRegistry::new());
        let scheduler = JobScheduler::start(config, registry.clone(), Arc::new(extractor));
        (scheduler, registry)
    }

    fn upload(mime_type: &str) -> UploadMetadata {
        UploadMetadata {
            original_filename: "report.pdf".to_string(),
            declared_size: None,
            mime_type: mime_type.to_string(),
        }
    }

    fn pdf_bytes() -> Bytes {
        Bytes::from_static(b"%PDF-1.7 scripted")
    }

    async fn wait_terminal(registry: &InMemoryJobRegistry, job_id: &JobId) -> Job {
        for _ in 0..1500 {
            let job = registry.get(job_id).unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    #[tokio::test]
    async fn test_submit_creates_pending_job() {
        let extractor = ScriptedExtractor {
            page_delay: Some(Duration::from_millis(200)),
            ..ScriptedExtractor::with_pages(&["text"])
        };
        // One worker kept busy so the second job stays queued
        let (scheduler, registry) = start(config(1, 4), extractor);
        assert_ok!(scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job_id = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();

        let job = registry.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.metadata.file_size_bytes, pdf_bytes().len() as u64);
        assert_eq!(job.metadata.content_sha256.len(), 64);
        assert_eq!(scheduler.stats().queued, 1);
    }

    #[tokio::test]
    async fn test_submitted_job_completes() {
        let (scheduler, registry) = start(
            config(2, 4),
            ScriptedExtractor::with_pages(&["Page one text.", "Page two text."]),
        );

        let job_id = scheduler.submit(pdf_bytes(), upload("Application/PDF; charset=binary")).unwrap();
        let job = wait_terminal(&registry, &job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        let chunks = registry.chunks(&job_id).unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.sequence_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_rejections_create_no_job() {
        let mut config = config(1, 1);
        config.server.max_upload_size = 8;
        let (scheduler, registry) = start(config, ScriptedExtractor::with_pages(&["x"]));

        let err = scheduler.submit(pdf_bytes(), upload("text/plain")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));

        let err = scheduler.submit(Bytes::new(), upload(PDF_MIME_TYPE)).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 8 }));

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_is_overloaded() {
        let extractor = ScriptedExtractor {
            page_delay: Some(Duration::from_millis(300)),
            ..ScriptedExtractor::with_pages(&["slow"])
        };
        let (scheduler, registry) = start(config(1, 1), extractor);

        let first = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();

        let err = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap_err();
        assert!(matches!(err, Error::Overloaded { capacity: 1 }));
        assert!(err.is_retryable());
        assert_eq!(registry.len(), 2);

        assert_eq!(wait_terminal(&registry, &first).await.status, JobStatus::Completed);
        assert_eq!(wait_terminal(&registry, &second).await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_capacity_burst_all_finish() {
        let (scheduler, registry) = start(
            config(3, 8),
            ScriptedExtractor::with_pages(&["Burst page one.", "Burst page two."]),
        );

        // Workers are idle, so everything beyond them lands in the queue
        let job_ids: Vec<JobId> = (0..8)
            .map(|_| scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap())
            .collect();

        for job_id in &job_ids {
            assert_eq!(wait_terminal(&registry, job_id).await.status, JobStatus::Completed);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = scheduler.stats();
        assert_eq!(stats.running, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_cancel_pending_and_terminal() {
        let extractor = ScriptedExtractor {
            page_delay: Some(Duration::from_millis(200)),
            ..ScriptedExtractor::with_pages(&["text"])
        };
        let (scheduler, registry) = start(config(1, 4), extractor);
        let busy = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();

        let job = scheduler.cancel(&queued).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "cancelled");

        let err = scheduler.cancel(&queued).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        assert_eq!(wait_terminal(&registry, &busy).await.status, JobStatus::Completed);
        // The queued dispatch is dropped without touching the record
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.get(&queued).unwrap().message, "cancelled");
    }

    #[tokio::test]
    async fn test_stalled_worker_is_failed_when_budget_is_spent() {
        let mut config = config(1, 2);
        config.processing.heartbeat_secs = 1;
        config.processing.watchdog_interval_secs = 1;
        config.processing.max_redispatch = 0;
        let extractor = ScriptedExtractor {
            page_delay: Some(Duration::from_millis(2500)),
            ..ScriptedExtractor::with_pages(&["stuck"])
        };
        let (scheduler, registry) = start(config, extractor);

        let job_id = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        let job = wait_terminal(&registry, &job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "worker stalled; retries exhausted");
        assert!(job.chunk_ids.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_worker_is_redispatched() {
        let mut config = config(1, 2);
        config.processing.heartbeat_secs = 1;
        config.processing.watchdog_interval_secs = 1;
        config.processing.max_redispatch = 1;
        let extractor = ScriptedExtractor {
            first_open_delay: Some(Duration::from_millis(2500)),
            ..ScriptedExtractor::with_pages(&["Eventually parsed."])
        };
        let (scheduler, registry) = start(config, extractor);

        let job_id = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        let job = wait_terminal(&registry, &job_id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(registry.chunks(&job_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_queued_redispatch_is_not_counted_as_stalled() {
        let mut config = config(1, 4);
        config.processing.heartbeat_secs = 1;
        config.processing.watchdog_interval_secs = 1;
        config.processing.max_redispatch = 1;
        // Only the first document stalls; every later run heartbeats every 400ms
        let extractor = ScriptedExtractor {
            first_open_delay: Some(Duration::from_millis(2500)),
            page_delay: Some(Duration::from_millis(400)),
            ..ScriptedExtractor::with_pages(&["One.", "Two.", "Three.", "Four.", "Five."])
        };
        let (scheduler, registry) = start(config, extractor);

        let stalled = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        let third = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();

        // The re-dispatch waits about 4s behind the other two jobs
        let job = wait_terminal(&registry, &stalled).await;
        assert_eq!(job.status, JobStatus::Completed, "message: {}", job.message);
        assert_eq!(registry.chunks(&stalled).unwrap().len(), 5);
        assert_eq!(wait_terminal(&registry, &second).await.status, JobStatus::Completed);
        assert_eq!(wait_terminal(&registry, &third).await.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_redispatch_keeps_the_job_deadline() {
        let mut config = config(1, 2);
        config.processing.heartbeat_secs = 1;
        config.processing.watchdog_interval_secs = 1;
        config.processing.max_redispatch = 1;
        config.processing.job_timeout_secs = 3;
        // The re-dispatched run alone needs 4s, well inside a fresh 3s window
        // only if the clock restarted at the re-dispatch
        let pages = ["Page."; 10];
        let extractor = ScriptedExtractor {
            first_open_delay: Some(Duration::from_millis(2500)),
            page_delay: Some(Duration::from_millis(400)),
            ..ScriptedExtractor::with_pages(&pages)
        };
        let (scheduler, registry) = start(config, extractor);

        let submitted = tokio::time::Instant::now();
        let job_id = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        let job = wait_terminal(&registry, &job_id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "timeout");
        assert!(submitted.elapsed() < Duration::from_millis(3800));
        assert!(job.chunk_ids.is_empty());
    }

    #[tokio::test]
    async fn test_retention_purges_finished_jobs() {
        let mut config = config(1, 2);
        config.retention.retention_secs = 0;
        config.retention.sweep_interval_secs = 1;
        let (scheduler, registry) = start(config, ScriptedExtractor::with_pages(&["short lived"]));

        let job_id = scheduler.submit(pdf_bytes(), upload(PDF_MIME_TYPE)).unwrap();
        wait_terminal(&registry, &job_id).await;
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert!(matches!(registry.get(&job_id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_pdf_mime_matching() {
        assert!(is_pdf_mime("application/pdf"));
        assert!(is_pdf_mime(" APPLICATION/PDF ; name=x"));
        assert!(!is_pdf_mime("application/x-pdf"));
        assert!(!is_pdf_mime("text/plain"));
        assert!(!is_pdf_mime(""));
    }
}
