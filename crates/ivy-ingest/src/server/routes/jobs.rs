//! Job status, chunk and cancellation endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::status::JobStatusView;
use crate::types::{ChunkSummary, JobId};

/// GET /api/jobs/:id/status - Get job status and progress
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobStatusView>> {
    let view = state.status().query_status(&job_id)?;
    Ok(Json(view))
}

/// GET /api/jobs/:id/chunks - Get the chunks of a completed job
pub async fn get_chunks(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Vec<ChunkSummary>>> {
    let chunks = state.status().query_chunks(&job_id)?;
    tracing::debug!("Serving {} chunks of job {}", chunks.len(), job_id);
    Ok(Json(chunks))
}

/// POST /api/jobs/:id/cancel - Cancel a pending or running job
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobStatusView>> {
    let job = state.scheduler().cancel(&job_id)?;
    Ok(Json(JobStatusView::from(&job)))
}
