//! Application state for the ingestion server

use std::sync::Arc;

use crate::config::IngestConfig;
use crate::ingestion::{DocumentExtractor, PdfExtractor};
use crate::processing::JobScheduler;
use crate::status::StatusApi;
use crate::storage::{InMemoryJobRegistry, JobRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: IngestConfig,
    /// Admission and dispatch
    scheduler: JobScheduler,
    /// Read-only job queries
    status: StatusApi,
}

impl AppState {
    /// Create state with the in-memory registry and the PDF extractor.
    /// Spawns the scheduler's background tasks.
    pub fn new(config: IngestConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(InMemoryJobRegistry::new()),
            Arc::new(PdfExtractor::new()),
        )
    }

    /// Create state around an injected registry and extractor
    pub fn with_components(
        config: IngestConfig,
        registry: Arc<dyn JobRegistry>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        tracing::info!(
            "Initializing ingestion state (extractor: {}, max upload: {} bytes)",
            extractor.name(),
            config.server.max_upload_size
        );

        let status = StatusApi::new(Arc::clone(&registry));
        let scheduler = JobScheduler::start(config.clone(), registry, extractor);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                scheduler,
                status,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.inner.scheduler
    }

    pub fn status(&self) -> &StatusApi {
        &self.inner.status
    }
}
