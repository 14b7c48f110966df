//! Ingestion server binary
//!
//! Run with: cargo run -p ivy-ingest --bin ivy-ingest-server

use ivy_ingest::{config::IngestConfig, server::IngestServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ivy_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = IngestConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Max upload size: {} bytes", config.server.max_upload_size);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Workers: {}, queue capacity: {}",
        config.processing.workers,
        config.processing.queue_capacity
    );
    tracing::info!(
        "  - Job timeout: {}s, heartbeat: {}s",
        config.processing.job_timeout_secs,
        config.processing.heartbeat_secs
    );

    let server = IngestServer::new(config);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/pdf/parse          - Upload a PDF");
    println!("  GET  /api/jobs/:id/status    - Poll job progress");
    println!("  GET  /api/jobs/:id/chunks    - Fetch parsed chunks");
    println!("  POST /api/jobs/:id/cancel    - Cancel a job");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
