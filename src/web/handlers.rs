//! HTTP handlers for recording ingestion and status polling

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::recordings::{ChunkOutcome, RecordingKind};
use crate::state::AppState;
use crate::transcode::JobStatus;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Response for a stored recording that entered the transcode pipeline
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub file_name: String,
    pub file_url: String,
}

/// Response for an accepted, not yet final, chunk
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgressResponse {
    pub ok: bool,
    pub upload_id: String,
    pub index: Option<u64>,
}

/// Fields extracted from a recording upload form
#[derive(Default)]
struct UploadForm {
    label: Option<String>,
    upload_id: Option<String>,
    index: Option<u64>,
    is_last: bool,
    original_name: Option<String>,
    data: Option<Bytes>,
}

/// Drain a multipart body into an [`UploadForm`]; field order is not
/// significant
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => {
                form.label = Some(read_text(field, &name).await?);
            }
            "uploadId" => {
                form.upload_id = Some(read_text(field, &name).await?);
            }
            "index" => {
                form.index = read_text(field, &name).await?.trim().parse().ok();
            }
            "isLast" => {
                form.is_last = parse_flag(&read_text(field, &name).await?);
            }
            "recording" => {
                form.original_name = field.file_name().map(|n| n.to_string());
                form.data = Some(field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read recording field: {}", e))
                })?);
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))
}

/// `true`/`1` in any case means set
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Store an upload and hand it to the transcode pipeline
async fn store_and_convert(
    state: &Arc<AppState>,
    kind: RecordingKind,
    file_name: String,
) -> Result<UploadResponse> {
    let job = state.transcoder.start_job(kind, &file_name).await?;
    Ok(UploadResponse {
        job_id: job.job_id,
        status: job.status,
        file_url: state.store.public_url(kind, &file_name),
        file_name,
    })
}

/// `POST /api/recordings/:kind`: single-shot recording upload
pub async fn upload_recording(
    State(state): State<Arc<AppState>>,
    AxumPath(kind): AxumPath<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let kind: RecordingKind = kind.parse()?;
    let form = read_upload_form(multipart).await?;

    let data = form
        .data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("No recording file received".to_string()))?;

    let file_name = state
        .store
        .derive_file_name(form.label.as_deref(), form.original_name.as_deref());
    let path = state.store.file_path(kind, &file_name)?;
    tokio::fs::write(&path, &data).await?;
    tracing::info!(file = %file_name, bytes = data.len(), "recording stored");

    let response = store_and_convert(&state, kind, file_name).await?;
    Ok(Json(response))
}

/// `POST /api/recordings/:kind/chunk`: one fragment of a chunked upload
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    AxumPath(kind): AxumPath<String>,
    multipart: Multipart,
) -> Result<Response> {
    let kind: RecordingKind = kind.parse()?;
    let mut form = read_upload_form(multipart).await?;

    let upload_id = form
        .upload_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Missing uploadId".to_string()))?;
    let data = form
        .data
        .take()
        .ok_or_else(|| AppError::BadRequest("No recording chunk received".to_string()))?;

    let outcome = state
        .assembler
        .append_chunk(
            kind,
            &upload_id,
            form.label.as_deref(),
            form.original_name.as_deref(),
            data,
            form.index,
            form.is_last,
        )
        .await?;

    match outcome {
        ChunkOutcome::Accepted { upload_id, index } => Ok(Json(ChunkProgressResponse {
            ok: true,
            upload_id,
            index,
        })
        .into_response()),
        ChunkOutcome::Finalized { file_name, .. } => {
            let response = store_and_convert(&state, kind, file_name).await?;
            Ok(Json(response).into_response())
        }
    }
}

/// `GET /api/conversion-status/:job_id`
pub async fn conversion_status(
    State(state): State<Arc<AppState>>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Json<crate::transcode::TranscodeJob>> {
    let job = state
        .transcoder
        .status(&job_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Unknown conversion job: {}", job_id)))?;
    Ok(Json(job))
}

/// `GET /recordings/:kind/:file_name`: fetch a stored recording; a
/// pre-conversion name whose converted sibling exists redirects there
pub async fn fetch_recording(
    State(state): State<Arc<AppState>>,
    AxumPath((kind, file_name)): AxumPath<(String, String)>,
) -> Result<Response> {
    let kind: RecordingKind = kind.parse()?;
    let path = state.store.file_path(kind, &file_name)?;

    if let Some(converted) = state.store.converted_name(&file_name) {
        let converted_path = state.store.file_path(kind, &converted)?;
        if converted_path.is_file() {
            let url = state.store.public_url(kind, &converted);
            return Ok(Redirect::temporary(&url).into_response());
        }
    }

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!(
                "Recording not found: {}",
                file_name
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&file_name)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
