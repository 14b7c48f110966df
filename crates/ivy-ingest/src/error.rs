//! Error types for the ingestion service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::JobStatus;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion service errors
///
/// Extraction failures are deliberately absent: they end up as the failed
/// job's message (see [`crate::ingestion::ExtractionError`]) and are reported
/// through the job record rather than returned to pollers.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upload is not a PDF
    #[error("Unsupported media type '{0}', expected application/pdf")]
    UnsupportedMediaType(String),

    /// Upload exceeds the configured maximum
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// Dispatch queue is full
    #[error("Ingestion queue is full ({capacity} jobs waiting), try again later")]
    Overloaded { capacity: usize },

    /// Malformed request (missing file field, bad form values, empty upload)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown or purged job
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Chunks requested before the job completed
    #[error("Job {job_id} is {status}, chunks are available once it completes")]
    NotReady { job_id: String, status: JobStatus },

    /// Illegal status transition requested on a job
    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Operation not allowed in the job's current state
    #[error("Job {job_id} is in an invalid state: {message}")]
    InvalidState { job_id: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid state error
    pub fn invalid_state(job_id: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidState {
            job_id: job_id.to_string(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the client may retry the same request later and expect success
    pub fn is_retryable(&self) -> bool {
        match self {
            // A failed job never gets chunks
            Error::NotReady { status, .. } => !status.is_terminal(),
            Error::Overloaded { .. } => true,
            _ => false,
        }
    }

    /// Machine-readable tag used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::UnsupportedMediaType(_) => "unsupported_media_type",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::Overloaded { .. } => "overloaded",
            Error::InvalidRequest(_) => "invalid_request",
            Error::NotFound(_) => "not_found",
            Error::NotReady { .. } => "not_ready",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::InvalidState { .. } => "invalid_state",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidRequest(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotReady { .. } => StatusCode::CONFLICT,
            Error::Config(_)
            | Error::InvalidTransition { .. }
            | Error::InvalidState { .. }
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
