use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path as UrlPath, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::{
    error::ApiError,
    models::{
        DownloadRequest, FormatsResponse, HealthResponse, ImpersonationStatus,
        JobAcceptedResponse, JobStatusResponse, JobsHealth, UrlInput,
    },
    state::AppState,
    utils::attachment_headers,
    validation::{validate_download_request, validate_url_input},
};
use crate::classify;
use crate::error::MediaError;
use crate::jobs::{IMPERSONATION_HINT, JobStatus, ProgressReporter};

/// Format menu for a URL (POST /api/formats)
///
/// Nothing is downloaded; the backend is asked for metadata only.
pub async fn formats(
    State(state): State<AppState>,
    payload: Result<Json<UrlInput>, JsonRejection>,
) -> Result<Json<FormatsResponse>, ApiError> {
    let Json(input) = payload?;
    let url = validate_url_input(&input)?;

    let description = state.executor.describe(&url).await?;
    debug!(%url, options = description.formats.len(), "Formats listed");

    Ok(Json(FormatsResponse {
        title: description.title,
        url,
        formats: description.formats,
    }))
}

/// Start an asynchronous download (POST /api/download/start)
///
/// Returns 202 with the job id as soon as the job is queued; clients then poll
/// the status endpoint and fetch the file once it reports `done`.
pub async fn download_start(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let job = validate_download_request(&request)?;
    classify::validate_url(&job.url)?;

    let url = job.url.clone();
    let job_id = state.broker.submit(job).await?;
    info!(%job_id, %url, "Download job accepted");

    Ok((StatusCode::ACCEPTED, Json(JobAcceptedResponse { job_id })))
}

/// Job status (GET /api/download/status/{job_id})
pub async fn download_status(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state.registry.get(&job_id)?;

    Ok(Json(JobStatusResponse {
        status: job.status,
        progress: job.progress,
        filename: job.display_filename,
        error: job.error_message,
    }))
}

/// Finished artifact (GET /api/download/file/{job_id})
pub async fn download_file(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let job = state.registry.get(&job_id)?;

    let (Some(path), Some(filename)) = (job.result_path, job.display_filename) else {
        return Err(MediaError::NotReady.into());
    };
    if job.status != JobStatus::Done {
        return Err(MediaError::NotReady.into());
    }

    let file = open_artifact(&path).await?;
    attachment(file, &filename).await
}

/// Download and stream in one request (POST /api/download)
///
/// The artifact is never registered as a job, so its files are removed as soon
/// as the response holds an open handle to it.
pub async fn download_sync(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let job = validate_download_request(&request)?;

    info!(url = %job.url, "Synchronous download started");
    let ignore: ProgressReporter = Arc::new(|_: u8| {});
    let artifact = state
        .executor
        .acquire(&job.url, job.format_selector.as_deref(), ignore)
        .await?;

    let opened = open_artifact(&artifact.path).await;
    // An unlinked file stays readable through the open handle on Unix
    state.executor.discard(&artifact).await;
    attachment(opened?, &artifact.filename).await
}

/// Whether browser impersonation is usable (GET /api/impersonation-status)
pub async fn impersonation_status(State(state): State<AppState>) -> Json<ImpersonationStatus> {
    let caps = &state.capabilities;
    let hint = (!caps.impersonation_available).then(|| IMPERSONATION_HINT.to_string());

    Json(ImpersonationStatus {
        browser_impersonation_installed: caps.impersonation_library_installed,
        backend_supports_impersonation: caps.impersonation_available,
        hint,
    })
}

/// Liveness and job counters (GET /health)
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: JobsHealth {
            tracked: state.registry.len(),
            queued: state.broker.queued(),
            workers: state.broker.workers(),
        },
        metrics: state.metrics.snapshot(),
    })
}

async fn open_artifact(path: &Path) -> Result<File, MediaError> {
    tokio::fs::File::open(path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Artifact not readable");
        MediaError::NotReady
    })
}

async fn attachment(file: File, filename: &str) -> Result<Response, ApiError> {
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((attachment_headers(filename, len), body).into_response())
}
