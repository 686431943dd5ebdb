//! Request and response bodies for the HTTP API.
//!
//! All fields travel in camelCase. Download requests accept the selector
//! as either `formatSelector` or `format_spec`:
//!
//! ```json
//! { "url": "https://example.com/watch?v=abc", "formatSelector": "bestvideo[height<=720]+bestaudio/best" }
//! ```

use serde::{Deserialize, Serialize};

use crate::formats::FormatOption;
use crate::jobs::JobStatus;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct UrlInput {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default, alias = "format_spec")]
    pub format_selector: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FormatsResponse {
    pub title: String,
    pub url: String,
    pub formats: Vec<FormatOption>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JobAcceptedResponse {
    pub job_id: String,
}

/// Poll result; `filename` and `error` serialize as `null` when absent.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub progress: u8,
    pub filename: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationStatus {
    pub browser_impersonation_installed: bool,
    pub backend_supports_impersonation: bool,
    pub hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobsHealth {
    pub tracked: usize,
    pub queued: usize,
    pub workers: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub jobs: JobsHealth,
    pub metrics: MetricsSnapshot,
}
