//! Upload endpoints — API-key protected ingestion surface.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use quorum_core::types::{JobStatusResponse, UploadResponse, YouTubeUploadRequest};
use quorum_core::Error;
use quorum_ingest::pdf::PdfSource;
use quorum_ingest::youtube::{extract_video_id, YouTubeSource};
use quorum_ingest::{spawn_job, IngestPipeline};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// All mutating upload endpoints require the shared `X-Api-Key`. A
/// server without a configured key refuses rather than running open.
fn require_api_key(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state
        .config
        .upload_api_key
        .as_deref()
        .ok_or_else(|| ApiError(Error::Upstream("UPLOAD_API_KEY not configured".into())))?;

    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(ApiError(Error::Unauthorized));
    }
    Ok(())
}

fn require_pipeline(state: &AppState) -> ApiResult<Arc<IngestPipeline>> {
    state
        .pipeline
        .clone()
        .ok_or_else(|| ApiError(Error::Unconfigured("Supabase".into())))
}

/// `POST /api/upload/youtube` — start a transcription job.
pub async fn youtube(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<YouTubeUploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    require_api_key(&state, &headers)?;
    let pipeline = require_pipeline(&state)?;

    if extract_video_id(&req.url).is_none() {
        return Err(ApiError(Error::Validation(format!(
            "invalid YouTube URL: {}",
            req.url
        ))));
    }
    let source = YouTubeSource::new(&req.url, req.language, req.chunk_size, req.overlap)?;

    let job_id = state.ledger.submit("Starting transcription...");
    info!(job_id = %job_id, video_id = source.video_id(), "YouTube upload accepted");

    let ledger = state.ledger.clone();
    let id = job_id.clone();
    let session_info = req.session_info;
    spawn_job(ledger, job_id.clone(), async move {
        pipeline.run(&id, &source, &session_info).await
    });

    Ok(Json(UploadResponse {
        job_id,
        status: "processing".into(),
        message: "Transcription job started".into(),
    }))
}

/// `POST /api/upload/pdf` — multipart `file` + `session_info`.
pub async fn pdf(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    require_api_key(&state, &headers)?;
    let pipeline = require_pipeline(&state)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut session_info: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(Error::Validation(format!("malformed multipart body: {e}"))))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError(Error::Validation(format!("failed to read file: {e}"))))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("session_info") => {
                session_info = Some(field.text().await.map_err(|e| {
                    ApiError(Error::Validation(format!("failed to read session_info: {e}")))
                })?);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError(Error::Validation("missing 'file' field".into())))?;
    let session_info = session_info
        .ok_or_else(|| ApiError(Error::Validation("missing 'session_info' field".into())))?;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError(Error::Validation("file must be a PDF".into())));
    }
    if bytes.is_empty() {
        return Err(ApiError(Error::Validation("empty file uploaded".into())));
    }

    let job_id = state.ledger.submit("Starting PDF processing...");
    info!(job_id = %job_id, filename = %filename, bytes = bytes.len(), "PDF upload accepted");

    let source = PdfSource::new(bytes, filename);
    let ledger = state.ledger.clone();
    let id = job_id.clone();
    spawn_job(ledger, job_id.clone(), async move {
        pipeline.run(&id, &source, &session_info).await
    });

    Ok(Json(UploadResponse {
        job_id,
        status: "processing".into(),
        message: "PDF processing job started".into(),
    }))
}

/// `GET /api/upload/status/{job_id}`.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .ledger
        .get(&job_id)
        .ok_or_else(|| ApiError(Error::NotFound(format!("job {job_id}"))))?;
    Ok(Json(job.to_response()))
}

#[derive(Deserialize)]
pub struct SourcesQuery {
    #[serde(default)]
    source_type: Option<String>,
}

/// `GET /api/upload/sources`.
pub async fn sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SourcesQuery>,
) -> ApiResult<Json<Value>> {
    let rag = state
        .rag
        .as_ref()
        .ok_or_else(|| ApiError(Error::Unconfigured("Supabase".into())))?;

    let sources = rag.store().list_sources(query.source_type.as_deref()).await?;
    Ok(Json(json!({ "sources": sources })))
}

/// `DELETE /api/upload/sources/{source_id}` — remove a source and its
/// embeddings.
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(source_id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_api_key(&state, &headers)?;
    let rag = state
        .rag
        .as_ref()
        .ok_or_else(|| ApiError(Error::Unconfigured("Supabase".into())))?;

    let deleted_embeddings = rag.store().delete_source(&source_id).await?;
    info!(%source_id, deleted_embeddings, "Source deleted");
    Ok(Json(json!({
        "success": true,
        "deleted_embeddings": deleted_embeddings,
    })))
}

/// `POST /api/upload/verify-key`.
pub async fn verify_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    require_api_key(&state, &headers)?;
    Ok(Json(json!({ "valid": true })))
}
