//! Configuration for the ingestion service

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "IVY_INGEST_CONFIG";
/// Overrides `server.host`
pub const HOST_ENV: &str = "IVY_INGEST_HOST";
/// Overrides `server.port`
pub const PORT_ENV: &str = "IVY_INGEST_PORT";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Scheduler and worker configuration
    pub processing: ProcessingConfig,
    /// Retention of finished jobs
    pub retention: RetentionConfig,
}

impl IngestConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: IngestConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `IVY_INGEST_CONFIG` if set, otherwise defaults, then apply
    /// host/port overrides from the environment
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(host) = std::env::var(HOST_ENV) {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{} must be a port number, got '{}'", PORT_ENV, port)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be greater than 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".into(),
            ));
        }
        if self.processing.workers == 0 {
            return Err(Error::Config("processing.workers must be greater than 0".into()));
        }
        if self.processing.queue_capacity == 0 {
            return Err(Error::Config("processing.queue_capacity must be greater than 0".into()));
        }
        if self.server.max_upload_size == 0 {
            return Err(Error::Config("server.max_upload_size must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum PDF size in bytes (default: 50MB)
    pub max_upload_size: u64,
    /// Ceiling for `?wait=true` uploads
    pub wait_timeout_secs: u64,
    /// Interval between server-side status reads while waiting
    pub wait_poll_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_size: 50 * 1024 * 1024,
            wait_timeout_secs: 120,
            wait_poll_ms: 250,
        }
    }
}

impl ServerConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in bytes of text
    pub chunk_size: usize,
    /// Overlap carried into the next chunk
    pub chunk_overlap: usize,
    /// Trailing pieces shorter than this are merged into the previous chunk
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            min_chunk_size: 50,
        }
    }
}

/// Scheduler and worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Concurrent parsing workers (default: CPU count, max 4)
    pub workers: usize,
    /// Jobs allowed to wait for a worker before submissions are rejected
    pub queue_capacity: usize,
    /// Wall-clock ceiling for one job
    pub job_timeout_secs: u64,
    /// A running job without a progress update for this long is stalled
    pub heartbeat_secs: u64,
    /// How often the watchdog looks for stalled jobs
    pub watchdog_interval_secs: u64,
    /// Retries for transient extraction failures
    pub max_retries: u32,
    /// Base delay for exponential retry backoff
    pub retry_backoff_ms: u64,
    /// Re-dispatches allowed for a stalled or crashed job
    pub max_redispatch: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 4),
            queue_capacity: 64,
            job_timeout_secs: 300, // 5 minutes
            heartbeat_secs: 60,
            watchdog_interval_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_redispatch: 1,
        }
    }
}

impl ProcessingConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// Retention of completed and failed jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Terminal jobs older than this are purged (default: 1 hour)
    pub retention_secs: u64,
    /// How often the sweeper runs
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl RetentionConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
