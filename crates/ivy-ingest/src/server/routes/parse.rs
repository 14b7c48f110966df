//! PDF upload endpoint

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::processing::UploadMetadata;
use crate::server::state::AppState;
use crate::types::{ChunkSummary, JobId, JobStatus};

/// Filename used when the client sends none
const DEFAULT_FILENAME: &str = "uploaded.pdf";

/// Query parameters of the upload endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ParseParams {
    /// Block until the job is terminal (bounded by `server.wait_timeout_secs`)
    #[serde(default)]
    pub wait: bool,
}

/// Response envelope
#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub data: ParseData,
}

#[derive(Debug, Serialize)]
pub struct ParseData {
    pub job_id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    /// Empty unless the upload waited for a completed job
    pub chunks: Vec<ChunkSummary>,
}

/// POST /api/pdf/parse - Upload a PDF and queue it for parsing
pub async fn parse_pdf(
    State(state): State<AppState>,
    params: std::result::Result<Query<ParseParams>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ParseResponse>)> {
    let Query(params) = params.map_err(|e| Error::InvalidRequest(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| Error::InvalidRequest(e.body_text()))?;

    let limit = state.config().server.max_upload_size;
    let (data, upload) = read_upload(&mut multipart, limit).await?;
    let filename = upload.original_filename.clone();

    tracing::info!(
        "Received upload: {} ({} bytes, {})",
        filename,
        data.len(),
        upload.mime_type
    );

    let job_id = state.scheduler().submit(data, upload)?;

    let (code, view) = if params.wait {
        let server = &state.config().server;
        let deadline = Instant::now() + server.wait_timeout();
        let view = state
            .status()
            .wait_for_terminal(&job_id, server.wait_poll(), deadline)
            .await?;
        let code = if view.status.is_terminal() {
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        };
        (code, view)
    } else {
        (StatusCode::ACCEPTED, state.status().query_status(&job_id)?)
    };

    let chunks = state.status().completed_chunks(&view)?;

    Ok((
        code,
        Json(ParseResponse {
            data: ParseData {
                job_id,
                filename,
                status: view.status,
                progress: view.progress,
                message: view.message,
                chunks,
            },
        }),
    ))
}

/// Collect the file and its metadata fields from the form
async fn read_upload(multipart: &mut Multipart, limit: u64) -> Result<(Bytes, UploadMetadata)> {
    let read_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::PayloadTooLarge { limit }
        } else {
            Error::InvalidRequest(format!("Failed to read multipart body: {}", e.body_text()))
        }
    };

    let mut file: Option<(Bytes, Option<String>, Option<String>)> = None;
    let mut original_filename = None;
    let mut declared_size = None;
    let mut mime_type = None;

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let field_filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(read_error)?;
                file = Some((data, field_filename, content_type));
            }
            "original_filename" => {
                original_filename = non_empty(field.text().await.map_err(read_error)?);
            }
            "file_size" => {
                let text = field.text().await.map_err(read_error)?;
                let size = text.trim().parse::<u64>().map_err(|_| {
                    Error::InvalidRequest(format!("file_size must be a byte count, got '{}'", text))
                })?;
                declared_size = Some(size);
            }
            "mime_type" => {
                mime_type = non_empty(field.text().await.map_err(read_error)?);
            }
            other => {
                tracing::debug!("Ignoring multipart field '{}'", other);
            }
        }
    }

    let (data, field_filename, content_type) =
        file.ok_or_else(|| Error::InvalidRequest("Missing 'file' field".to_string()))?;

    let original_filename = original_filename
        .or_else(|| field_filename.and_then(non_empty))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    let mime_type = mime_type
        .or_else(|| content_type.filter(|ct| ct != "application/octet-stream"))
        .unwrap_or_else(|| {
            mime_guess::from_path(&original_filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    Ok((
        data,
        UploadMetadata {
            original_filename,
            declared_size,
            mime_type,
        },
    ))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
