//! API routes for the ingestion server

pub mod jobs;
pub mod parse;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Room for multipart boundaries and the small metadata fields
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build all API routes
pub fn api_routes(max_upload_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Upload - body limit sized for the largest accepted PDF
        .route(
            "/pdf/parse",
            post(parse::parse_pdf).layer(DefaultBodyLimit::max(body_limit)),
        )
        // Job polling
        .route("/jobs/:id/status", get(jobs::get_status))
        .route("/jobs/:id/chunks", get(jobs::get_chunks))
        .route("/jobs/:id/cancel", post(jobs::cancel_job))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "ivy-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Asynchronous PDF ingestion: upload, parse in the background, poll for chunks",
        "endpoints": {
            "POST /api/pdf/parse": "Upload a PDF for parsing (add ?wait=true to block until done)",
            "GET /api/jobs/:id/status": "Get job status and progress",
            "GET /api/jobs/:id/chunks": "Get the chunks of a completed job",
            "POST /api/jobs/:id/cancel": "Cancel a pending or running job"
        },
        "limits": {
            "max_upload_size": state.config().server.max_upload_size,
            "chunk_size": state.config().chunking.chunk_size,
            "chunk_overlap": state.config().chunking.chunk_overlap
        },
        "queue": state.scheduler().stats()
    }))
}
