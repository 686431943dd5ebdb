//! Adapters for the external acquisition tools
//!
//! The executor talks to two seams:
//! - [`MediaBackend`]: metadata extraction and download for generic media URLs
//!   (implemented by [`YtDlpBackend`])
//! - [`StreamingService`]: title lookup and audio download for music-streaming
//!   links (implemented by [`SpotdlService`])
//!
//! Adapters classify tool failures into a [`BackendErrorKind`] at the process
//! boundary so callers never match on raw stderr text.

mod process;
pub mod spotdl;
pub mod ytdlp;

pub use spotdl::SpotdlService;
pub use ytdlp::YtDlpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Metadata reported by the extraction backend for one media item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fulltitle: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<StreamFormat>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_downloads: Vec<RequestedDownload>,
    /// Final path after post-processing
    #[serde(default)]
    pub filepath: Option<PathBuf>,
    /// Path produced by the output template before post-processing
    #[serde(default, rename = "_filename")]
    pub template_filename: Option<PathBuf>,
    #[serde(default)]
    pub ext: Option<String>,
}

impl MediaInfo {
    /// Path the backend reports for the finished artifact, if any
    pub fn primary_path(&self) -> Option<&Path> {
        self.filepath
            .as_deref()
            .or(self.template_filename.as_deref())
    }

    /// First manifest entry path, used when the primary path is gone
    pub fn requested_path(&self) -> Option<&Path> {
        self.requested_downloads
            .iter()
            .find_map(|entry| entry.filepath.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    /// Pixel height; non-integral or missing values read as `None`
    #[serde(default, deserialize_with = "integral_height")]
    pub height: Option<u32>,
    #[serde(default)]
    pub ext: Option<String>,
}

impl StreamFormat {
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != "none")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedDownload {
    #[serde(default)]
    pub filepath: Option<PathBuf>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn integral_height<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_u64())
        .filter(|h| *h > 0)
        .and_then(|h| u32::try_from(h).ok()))
}

/// Progress reported while a backend download runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    Finished,
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Per-site request shaping shared by metadata and download calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteOptions {
    /// Browser target handed to the generic extractor for bot-protected sites
    pub impersonate: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub force_generic_extractor: bool,
    pub cookies_from_browser: Option<String>,
    pub js_runtimes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDownloader {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: String,
    pub output_template: String,
    pub concurrent_fragments: u32,
    pub buffer_size: u64,
    pub http_chunk_size: u64,
    pub site: SiteOptions,
    /// Container to remux merged streams into
    pub merge_output_format: Option<String>,
    pub external_downloader: Option<ExternalDownloader>,
}

/// What a finished backend download produced
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub info: MediaInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The site needs browser impersonation but the library is missing
    ImpersonationUnavailable,
    /// The site rejected the request (bot protection)
    Blocked,
    /// The tool ran and reported an error
    Failed,
    /// The tool did not finish within its bound
    Timeout,
    /// The tool could not be started
    Spawn,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(what: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, what)
    }

    pub fn spawn(tool: &str, err: std::io::Error) -> Self {
        Self::new(BackendErrorKind::Spawn, format!("failed to run {tool}: {err}"))
    }

    /// Classify a failed run from the tool's diagnostic output.
    ///
    /// The reported message is the last `ERROR:` line when there is one,
    /// otherwise the last non-empty line.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with("ERROR:"))
            .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or("unknown error")
            .to_string();

        let lower = stderr.to_lowercase();
        let kind = if lower.contains("impersonat")
            && (lower.contains("not available") || stderr.contains("Cloudflare"))
        {
            BackendErrorKind::ImpersonationUnavailable
        } else if stderr.contains("Cloudflare") {
            BackendErrorKind::Blocked
        } else {
            BackendErrorKind::Failed
        };

        Self::new(kind, message)
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Fetch metadata without downloading
    async fn extract_info(&self, url: &str, site: &SiteOptions) -> Result<MediaInfo, BackendError>;

    /// Download according to `options`, reporting progress as it goes
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: ProgressSink,
    ) -> Result<DownloadOutcome, BackendError>;
}

#[async_trait]
pub trait StreamingService: Send + Sync {
    /// Human-readable title for a streaming link
    async fn fetch_title(&self, url: &str, timeout: Duration) -> Result<String, BackendError>;

    /// Download into `workdir`; the caller picks the produced file
    async fn download(&self, url: &str, workdir: &Path, timeout: Duration)
    -> Result<(), BackendError>;
}
