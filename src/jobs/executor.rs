//! Drives one acquisition from URL to artifact
//!
//! The executor owns a job id for the duration of [`JobExecutor::run`]: it moves
//! the job to `downloading`, routes the URL to the right backend, feeds progress
//! into the registry and records the final outcome. Nothing here retries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::models::JobRequest;
use super::registry::JobRegistry;
use crate::backend::{
    BackendError, BackendErrorKind, DownloadOptions, ExternalDownloader, MediaBackend,
    ProgressEvent, ProgressSink, SiteOptions, StreamingService,
};
use crate::capabilities::CapabilitySnapshot;
use crate::classify::{self, UrlClass};
use crate::config::{ARIA2C_MAX_CONNECTIONS, Config};
use crate::error::{MediaError, Result};
use crate::filename;
use crate::formats::{self, FormatOption};
use crate::observability::Metrics;

pub const IMPERSONATION_HINT: &str =
    "Cloudflare/impersonation needs curl_cffi. Run: pip install curl_cffi  then restart the app.";
pub const BLOCKED_HINT: &str =
    "Site blocked by Cloudflare. Install: pip install curl_cffi  then restart the app.";
pub const STREAMING_TOOL_HINT: &str =
    "Spotify links require spotdl. Install with: pip install spotdl";

const STREAMING_TITLE_FALLBACK: &str = "Spotify track";
const UNKNOWN_TITLE: &str = "Unknown";
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "ogg"];
const OUTPUT_TEMPLATE: &str = "%(id)s_%(title).100s.%(ext)s";
const MERGE_CONTAINER: &str = "mp4";
const STREAMING_STARTED_PROGRESS: u8 = 10;
const UNKNOWN_TOTAL_PROGRESS: u8 = 50;

/// Receives whole-percent progress for one acquisition
pub type ProgressReporter = Arc<dyn Fn(u8) + Send + Sync>;

/// Knobs the executor reads from configuration
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub downloads_dir: PathBuf,
    pub cookies_browser: String,
    pub impersonate_target: String,
    pub aria2c_program: String,
    pub concurrent_fragments: u32,
    pub buffer_size: u64,
    pub http_chunk_size: u64,
    pub aria2c_connections: u32,
    pub aria2c_splits: u32,
    pub streaming_metadata_timeout: Duration,
    pub streaming_download_timeout: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            downloads_dir: config.storage.downloads_dir.clone(),
            cookies_browser: config.tools.cookies_browser.clone(),
            impersonate_target: config.tools.impersonate_target.clone(),
            aria2c_program: config.tools.aria2c.clone(),
            concurrent_fragments: config.download.concurrent_fragments,
            buffer_size: config.download.buffer_size.as_u64(),
            http_chunk_size: config.download.http_chunk_size.as_u64(),
            aria2c_connections: config.download.aria2c_connections,
            aria2c_splits: config.download.aria2c_splits,
            streaming_metadata_timeout: Duration::from_secs(config.streaming.metadata_timeout_secs),
            streaming_download_timeout: Duration::from_secs(config.streaming.download_timeout_secs),
        }
    }
}

/// A finished file and the name clients should see for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub filename: String,
    /// Per-acquisition directory under `downloads_dir` holding `path`
    pub workdir: PathBuf,
}

/// Title and option menu for a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub title: String,
    pub formats: Vec<FormatOption>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Metadata,
    Download,
}

#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
    backend: Arc<dyn MediaBackend>,
    streaming: Arc<dyn StreamingService>,
    capabilities: Arc<CapabilitySnapshot>,
    settings: Arc<ExecutorSettings>,
    metrics: Arc<Metrics>,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        backend: Arc<dyn MediaBackend>,
        streaming: Arc<dyn StreamingService>,
        capabilities: Arc<CapabilitySnapshot>,
        settings: ExecutorSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            backend,
            streaming,
            capabilities,
            settings: Arc::new(settings),
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilitySnapshot {
        &self.capabilities
    }

    /// Run the job to a terminal state. Failures are recorded, never returned.
    pub async fn run(&self, job_id: &str, request: JobRequest) {
        if let Err(e) = self.registry.mark_downloading(job_id) {
            warn!(job_id, error = %e, "Job vanished before it started");
            return;
        }
        info!(job_id, url = %request.url, "Job started");

        let registry = Arc::clone(&self.registry);
        let id = job_id.to_string();
        let reporter: ProgressReporter = Arc::new(move |percent| {
            if let Err(e) = registry.set_progress(&id, percent) {
                debug!(job_id = %id, error = %e, "Progress dropped");
            }
        });

        match self
            .acquire(&request.url, request.format_selector.as_deref(), reporter)
            .await
        {
            Ok(artifact) => {
                info!(job_id, path = %artifact.path.display(), filename = %artifact.filename, "Job finished");
                if let Err(e) = self.registry.complete(job_id, artifact.path, artifact.filename) {
                    warn!(job_id, error = %e, "Could not record completion");
                }
                self.metrics.job_completed();
            }
            Err(err) => {
                warn!(job_id, error = %err, "Job failed");
                if let Err(e) = self.registry.fail(job_id, err.to_string()) {
                    warn!(job_id, error = %e, "Could not record failure");
                }
                self.metrics.job_failed();
            }
        }
    }

    /// Fetch one artifact for `url`, reporting progress through `report`.
    pub async fn acquire(
        &self,
        url: &str,
        selector: Option<&str>,
        report: ProgressReporter,
    ) -> Result<Artifact> {
        let parsed = classify::validate_url(url)?;

        match classify::classify(&parsed) {
            UrlClass::StreamingMetadataService => self.acquire_streaming(&parsed, &report).await,
            UrlClass::GenericMedia {
                requires_auth_cookies,
            } => {
                self.acquire_generic(&parsed, requires_auth_cookies, selector, report)
                    .await
            }
        }
    }

    /// Title and format menu for `url`, without downloading anything.
    pub async fn describe(&self, url: &str) -> Result<MediaDescription> {
        let parsed = classify::validate_url(url)?;

        match classify::classify(&parsed) {
            UrlClass::StreamingMetadataService => {
                if !self.capabilities.metadata_service_available {
                    return Err(MediaError::ToolMissing(STREAMING_TOOL_HINT.to_string()));
                }
                let title = self
                    .streaming
                    .fetch_title(parsed.as_str(), self.settings.streaming_metadata_timeout)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(url = %parsed, error = %e, "Streaming title lookup failed");
                        STREAMING_TITLE_FALLBACK.to_string()
                    });
                Ok(MediaDescription {
                    title,
                    formats: formats::streaming_service_options(),
                })
            }
            UrlClass::GenericMedia {
                requires_auth_cookies,
            } => {
                let site = self.site_options(&parsed, requires_auth_cookies);
                let info = self
                    .backend
                    .extract_info(parsed.as_str(), &site)
                    .await
                    .map_err(|e| map_backend_error(e, Stage::Metadata))?;

                let title = info
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(UNKNOWN_TITLE)
                    .to_string();
                Ok(MediaDescription {
                    title,
                    formats: formats::build(&info, &self.capabilities),
                })
            }
        }
    }

    async fn acquire_streaming(&self, url: &Url, report: &ProgressReporter) -> Result<Artifact> {
        if !self.capabilities.metadata_service_available {
            return Err(MediaError::ToolMissing(STREAMING_TOOL_HINT.to_string()));
        }
        report(STREAMING_STARTED_PROGRESS);

        let workdir = self.fresh_workdir().await?;
        let downloaded = self
            .streaming
            .download(url.as_str(), &workdir, self.settings.streaming_download_timeout)
            .await;
        if let Err(e) = downloaded {
            discard_workdir(&workdir).await;
            return Err(map_backend_error(e, Stage::Download));
        }

        let newest = match newest_audio_file(&workdir).await {
            Ok(newest) => newest,
            Err(e) => {
                discard_workdir(&workdir).await;
                return Err(e);
            }
        };
        let Some(path) = newest else {
            discard_workdir(&workdir).await;
            return Err(MediaError::ArtifactMissing(
                "Spotify download produced no audio file".to_string(),
            ));
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename::sanitize(""));

        Ok(Artifact {
            path,
            filename,
            workdir,
        })
    }

    async fn acquire_generic(
        &self,
        url: &Url,
        requires_auth_cookies: bool,
        selector: Option<&str>,
        report: ProgressReporter,
    ) -> Result<Artifact> {
        let selector = selector
            .map(str::to_string)
            .unwrap_or_else(|| formats::default_selector(&self.capabilities).to_string());

        let workdir = self.fresh_workdir().await?;
        let options = self.download_options(url, requires_auth_cookies, &selector, &workdir);
        debug!(url = %url, format = %options.format, workdir = %workdir.display(), "Download options prepared");

        let sink: ProgressSink = Arc::new(move |event| report(progress_percent(event)));
        let outcome = match self.backend.download(url.as_str(), &options, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                discard_workdir(&workdir).await;
                return Err(map_backend_error(e, Stage::Download));
            }
        };

        let located = locate_artifact(
            outcome.info.primary_path(),
            outcome.info.requested_path(),
        )
        .await;
        let Some(path) = located else {
            discard_workdir(&workdir).await;
            return Err(MediaError::ArtifactMissing(
                "Downloaded file not found".to_string(),
            ));
        };
        let filename = filename::resolve(&outcome.info, &path);

        Ok(Artifact {
            path,
            filename,
            workdir,
        })
    }

    /// A new, empty directory under `downloads_dir` owned by one acquisition
    async fn fresh_workdir(&self) -> Result<PathBuf> {
        let workdir = self
            .settings
            .downloads_dir
            .join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(&workdir).await?;
        Ok(workdir)
    }

    /// Delete an artifact nobody will fetch again, with its work directory.
    pub async fn discard(&self, artifact: &Artifact) {
        discard_workdir(&artifact.workdir).await;
    }

    /// Request shaping for `url`
    pub fn site_options(&self, url: &Url, requires_auth_cookies: bool) -> SiteOptions {
        let mut headers = BTreeMap::new();
        if let Some(referer) = classify::origin_referer(url) {
            headers.insert("Referer".to_string(), referer);
        }

        SiteOptions {
            impersonate: Some(self.settings.impersonate_target.clone()),
            headers,
            force_generic_extractor: classify::is_embed_page(url),
            cookies_from_browser: requires_auth_cookies
                .then(|| self.settings.cookies_browser.clone()),
            js_runtimes: self.capabilities.script_runtimes.clone(),
        }
    }

    /// Full backend options for downloading `url` with `selector`
    pub fn download_options(
        &self,
        url: &Url,
        requires_auth_cookies: bool,
        selector: &str,
        workdir: &Path,
    ) -> DownloadOptions {
        let settings = &self.settings;
        let caps = &self.capabilities;

        let merge_output_format = (selector.contains('+') && caps.merge_tool_available)
            .then(|| MERGE_CONTAINER.to_string());

        let external_downloader = caps.accelerated_downloader_available.then(|| {
            let connections = settings.aria2c_connections.min(ARIA2C_MAX_CONNECTIONS).to_string();
            ExternalDownloader {
                name: settings.aria2c_program.clone(),
                args: vec![
                    "-x".to_string(),
                    connections.clone(),
                    "-s".to_string(),
                    settings.aria2c_splits.to_string(),
                    "-k".to_string(),
                    "1M".to_string(),
                    "-j".to_string(),
                    connections,
                    "--min-split-size=1M".to_string(),
                ],
            }
        });

        DownloadOptions {
            format: selector.to_string(),
            output_template: workdir
                .join(OUTPUT_TEMPLATE)
                .to_string_lossy()
                .into_owned(),
            concurrent_fragments: settings.concurrent_fragments,
            buffer_size: settings.buffer_size,
            http_chunk_size: settings.http_chunk_size,
            site: self.site_options(url, requires_auth_cookies),
            merge_output_format,
            external_downloader,
        }
    }
}

/// Whole-percent progress for a backend event
pub fn progress_percent(event: ProgressEvent) -> u8 {
    match event {
        ProgressEvent::Downloading {
            downloaded_bytes,
            total_bytes: Some(total),
        } if total > 0 => (downloaded_bytes.saturating_mul(100) / total).min(100) as u8,
        ProgressEvent::Downloading { .. } => UNKNOWN_TOTAL_PROGRESS,
        ProgressEvent::Finished => 100,
    }
}

fn map_backend_error(err: BackendError, stage: Stage) -> MediaError {
    match (err.kind, stage) {
        (BackendErrorKind::ImpersonationUnavailable, _) => {
            MediaError::ToolMissing(IMPERSONATION_HINT.to_string())
        }
        (BackendErrorKind::Blocked, Stage::Metadata) => {
            MediaError::ToolMissing(BLOCKED_HINT.to_string())
        }
        (BackendErrorKind::Timeout, _) => MediaError::Timeout(err.message),
        (_, Stage::Metadata) => MediaError::MetadataFetch(err.message),
        (_, Stage::Download) => MediaError::Download(err.message),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// The reported path if it exists, else the first manifest entry if that exists.
async fn locate_artifact(primary: Option<&Path>, requested: Option<&Path>) -> Option<PathBuf> {
    for candidate in [primary, requested].into_iter().flatten() {
        if is_file(candidate).await {
            return Some(candidate.to_path_buf());
        }
    }
    None
}

async fn discard_workdir(workdir: &Path) {
    match tokio::fs::remove_dir_all(workdir).await {
        Ok(()) => debug!(workdir = %workdir.display(), "Work directory removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(workdir = %workdir.display(), error = %e, "Work directory not removed"),
    }
}

async fn newest_audio_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !is_audio {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MediaInfo;
    use crate::jobs::models::{JobState, JobStatus};
    use crate::jobs::testing::{FakeBackend, FakeStreaming};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn caps(merge: bool, aria2c: bool, spotdl: bool) -> CapabilitySnapshot {
        CapabilitySnapshot {
            merge_tool_available: merge,
            accelerated_downloader_available: aria2c,
            metadata_service_available: spotdl,
            script_runtimes: vec!["node".to_string()],
            ..Default::default()
        }
    }

    fn executor(
        dir: &Path,
        backend: FakeBackend,
        streaming: FakeStreaming,
        caps: CapabilitySnapshot,
    ) -> JobExecutor {
        let mut config = Config::default();
        config.storage.downloads_dir = dir.to_path_buf();
        JobExecutor::new(
            Arc::new(JobRegistry::new()),
            Arc::new(backend),
            Arc::new(streaming),
            Arc::new(caps),
            ExecutorSettings::from_config(&config),
            Arc::new(Metrics::new()),
        )
    }

    async fn run_job(executor: &JobExecutor, url: &str, selector: Option<&str>) -> JobState {
        executor.registry().create(JobState::pending("job"));
        executor
            .run("job", JobRequest::new(url, selector.map(str::to_string)))
            .await;
        executor.registry().get("job").unwrap()
    }

    fn noop() -> ProgressReporter {
        Arc::new(|_: u8| {})
    }

    #[test]
    fn percent_mapping() {
        let downloading = |d, t| ProgressEvent::Downloading {
            downloaded_bytes: d,
            total_bytes: t,
        };
        assert_eq!(progress_percent(downloading(25, Some(100))), 25);
        assert_eq!(progress_percent(downloading(200, Some(100))), 100);
        assert_eq!(progress_percent(downloading(10, None)), 50);
        assert_eq!(progress_percent(downloading(10, Some(0))), 50);
        assert_eq!(progress_percent(ProgressEvent::Finished), 100);
    }

    #[tokio::test]
    async fn generic_job_completes() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            info: MediaInfo {
                id: Some("abc".to_string()),
                title: Some("Clip: The Movie".to_string()),
                ..Default::default()
            },
            produce: Some("abc_Clip.mp4"),
            events: vec![
                ProgressEvent::Downloading {
                    downloaded_bytes: 30,
                    total_bytes: Some(100),
                },
                ProgressEvent::Finished,
            ],
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let state = run_job(&executor, "https://example.com/watch/1", None).await;

        assert_eq!(state.status, JobStatus::Done);
        assert_eq!(state.progress, 100);
        let path = state.result_path.clone().unwrap();
        assert!(path.is_file());
        assert_eq!(path.file_name().unwrap(), "abc_Clip.mp4");
        assert_eq!(path.parent().unwrap().parent(), Some(dir.path()));
        assert_eq!(state.display_filename.as_deref(), Some("Clip The Movie.mp4"));
        assert!(state.error_message.is_none());
        assert_eq!(executor.metrics.snapshot().jobs_completed, 1);
    }

    #[tokio::test]
    async fn failure_keeps_reported_progress() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            events: vec![ProgressEvent::Downloading {
                downloaded_bytes: 30,
                total_bytes: Some(100),
            }],
            error: Some(BackendError::new(BackendErrorKind::Failed, "ERROR: HTTP Error 404")),
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let state = run_job(&executor, "https://example.com/watch/1", None).await;

        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.progress, 30);
        assert!(state.error_message.unwrap().contains("HTTP Error 404"));
        assert!(state.result_path.is_none());
        assert_eq!(executor.metrics.snapshot().jobs_failed, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn impersonation_failure_becomes_install_hint() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            error: Some(BackendError::new(
                BackendErrorKind::ImpersonationUnavailable,
                "Impersonate target not available",
            )),
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let state = run_job(&executor, "https://example.com/v", None).await;
        assert_eq!(state.error_message.as_deref(), Some(IMPERSONATION_HINT));
        assert_eq!(state.progress, 0);
    }

    #[tokio::test]
    async fn falls_back_to_requested_download_path() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            info: MediaInfo {
                id: Some("abc".to_string()),
                ..Default::default()
            },
            produce: Some("abc_Song.m4a"),
            report_as_requested: true,
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let artifact = executor
            .acquire("https://example.com/a", Some("bestaudio/best"), noop())
            .await
            .unwrap();
        assert_eq!(artifact.path, artifact.workdir.join("abc_Song.m4a"));
        assert!(artifact.path.is_file());
        assert_eq!(artifact.filename, "Song.m4a");
    }

    #[tokio::test]
    async fn missing_artifact_is_reported() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            info: MediaInfo {
                filepath: Some(dir.path().join("gone.mp4")),
                ..Default::default()
            },
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let state = run_job(&executor, "https://example.com/v", None).await;
        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("Downloaded file not found"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn default_selector_follows_merge_tool() {
        let dir = TempDir::new().unwrap();
        for (merge, expected) in [(true, "bestvideo+bestaudio/best"), (false, "best")] {
            let backend = Arc::new(FakeBackend::default());
            let mut config = Config::default();
            config.storage.downloads_dir = dir.path().to_path_buf();
            let executor = JobExecutor::new(
                Arc::new(JobRegistry::new()),
                backend.clone(),
                Arc::new(FakeStreaming::default()),
                Arc::new(caps(merge, false, false)),
                ExecutorSettings::from_config(&config),
                Arc::new(Metrics::new()),
            );

            let _ = executor.acquire("https://example.com/v", None, noop()).await;
            let seen = backend.seen.lock().unwrap();
            assert_eq!(seen[0].format, expected);
            assert_eq!(seen[0].merge_output_format.is_some(), merge);
        }
    }

    #[test]
    fn options_for_cookie_host_with_aria2c() {
        let dir = TempDir::new().unwrap();
        let executor = executor(
            dir.path(),
            FakeBackend::default(),
            FakeStreaming::default(),
            caps(true, true, false),
        );
        let url = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();

        let workdir = dir.path().join("job-1");
        let options = executor.download_options(
            &url,
            true,
            "bestvideo[height<=720]+bestaudio/best[height<=720]",
            &workdir,
        );

        assert_eq!(options.merge_output_format.as_deref(), Some("mp4"));
        assert_eq!(options.site.cookies_from_browser.as_deref(), Some("chrome"));
        assert_eq!(options.site.impersonate.as_deref(), Some("chrome"));
        assert_eq!(
            options.site.headers.get("Referer").map(String::as_str),
            Some("https://www.youtube.com/")
        );
        assert!(!options.site.force_generic_extractor);
        assert_eq!(options.site.js_runtimes, vec!["node"]);
        assert_eq!(options.concurrent_fragments, 5000);
        assert_eq!(options.buffer_size, 4 * 1024 * 1024);
        assert_eq!(options.http_chunk_size, 100 * 1024 * 1024);
        assert_eq!(
            Path::new(&options.output_template),
            workdir.join("%(id)s_%(title).100s.%(ext)s")
        );

        let aria2c = options.external_downloader.unwrap();
        assert_eq!(aria2c.name, "aria2c");
        assert_eq!(
            aria2c.args,
            vec!["-x", "16", "-s", "5000", "-k", "1M", "-j", "16", "--min-split-size=1M"]
        );
    }

    #[test]
    fn options_without_optional_tools() {
        let dir = TempDir::new().unwrap();
        let executor = executor(
            dir.path(),
            FakeBackend::default(),
            FakeStreaming::default(),
            caps(false, false, false),
        );
        let url = Url::parse("https://cdn.example.com/embed/xyz").unwrap();

        let options = executor.download_options(&url, false, "bestvideo+bestaudio/best", dir.path());

        assert!(options.merge_output_format.is_none());
        assert!(options.external_downloader.is_none());
        assert!(options.site.cookies_from_browser.is_none());
        assert!(options.site.force_generic_extractor);
    }

    #[tokio::test]
    async fn streaming_requires_tool() {
        let dir = TempDir::new().unwrap();
        let executor = executor(
            dir.path(),
            FakeBackend::default(),
            FakeStreaming::default(),
            caps(true, false, false),
        );

        let state = run_job(&executor, "https://open.spotify.com/track/1", None).await;
        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some(STREAMING_TOOL_HINT));

        let err = executor.describe("https://open.spotify.com/track/1").await.unwrap_err();
        assert!(matches!(err, MediaError::ToolMissing(_)));
    }

    #[tokio::test]
    async fn streaming_picks_newest_audio_file() {
        let dir = TempDir::new().unwrap();
        let streaming = FakeStreaming {
            files: vec![
                ("Old Song.mp3", Duration::from_secs(600)),
                ("New Song.OPUS", Duration::from_secs(5)),
                ("cover.jpg", Duration::from_secs(0)),
            ],
            ..Default::default()
        };
        let executor = executor(dir.path(), FakeBackend::default(), streaming, caps(true, false, true));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter: ProgressReporter = Arc::new(move |p: u8| sink.lock().unwrap().push(p));

        let artifact = executor
            .acquire("https://open.spotify.com/track/1", None, reporter)
            .await
            .unwrap();

        assert_eq!(artifact.filename, "New Song.OPUS");
        assert!(artifact.path.starts_with(dir.path()));
        assert_eq!(*seen.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn streaming_without_audio_output() {
        let dir = TempDir::new().unwrap();
        let streaming = FakeStreaming {
            files: vec![("notes.txt", Duration::from_secs(0))],
            ..Default::default()
        };
        let executor = executor(dir.path(), FakeBackend::default(), streaming, caps(true, false, true));

        let state = run_job(&executor, "https://open.spotify.com/track/1", None).await;
        assert_eq!(
            state.error_message.as_deref(),
            Some("Spotify download produced no audio file")
        );
        assert_eq!(state.progress, 10);
    }

    #[tokio::test]
    async fn streaming_timeout_is_reported() {
        let dir = TempDir::new().unwrap();
        let streaming = FakeStreaming {
            error: Some(BackendError::timeout("Spotify download")),
            ..Default::default()
        };
        let executor = executor(dir.path(), FakeBackend::default(), streaming, caps(true, false, true));

        let err = executor
            .acquire("https://open.spotify.com/track/1", None, noop())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
        assert_eq!(err.to_string(), "Spotify download timed out");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn same_url_gets_separate_files() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            info: MediaInfo {
                id: Some("abc".to_string()),
                title: Some("Clip".to_string()),
                ..Default::default()
            },
            produce: Some("abc_Clip.mp4"),
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let first = executor.acquire("https://example.com/v", None, noop()).await.unwrap();
        let second = executor.acquire("https://example.com/v", None, noop()).await.unwrap();

        assert_ne!(first.path, second.path);
        assert_ne!(first.workdir, second.workdir);

        executor.discard(&first).await;
        assert!(!first.workdir.exists());
        assert!(second.path.is_file());
    }

    #[tokio::test]
    async fn describe_generic_and_streaming() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            info: MediaInfo {
                title: None,
                ..Default::default()
            },
            ..Default::default()
        };
        let streaming = FakeStreaming {
            title: Some("Song - Artist".to_string()),
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, streaming, caps(true, false, true));

        let generic = executor.describe("https://example.com/v").await.unwrap();
        assert_eq!(generic.title, "Unknown");
        assert_eq!(generic.formats.len(), 1);
        assert_eq!(generic.formats[0].id, "best");

        let spotify = executor.describe("https://open.spotify.com/track/1").await.unwrap();
        assert_eq!(spotify.title, "Song - Artist");
        assert_eq!(spotify.formats[0].format_selector, "spotify_audio");
    }

    #[tokio::test]
    async fn describe_maps_blocked_sites() {
        let dir = TempDir::new().unwrap();
        let backend = FakeBackend {
            error: Some(BackendError::new(BackendErrorKind::Blocked, "Cloudflare")),
            ..Default::default()
        };
        let executor = executor(dir.path(), backend, FakeStreaming::default(), caps(true, false, false));

        let err = executor.describe("https://example.com/v").await.unwrap_err();
        assert_eq!(err.to_string(), BLOCKED_HINT);

        let err = executor.describe("ftp://example.com/v").await.unwrap_err();
        assert!(matches!(err, MediaError::Validation(_)));
    }

    #[tokio::test]
    async fn streaming_title_falls_back() {
        let dir = TempDir::new().unwrap();
        let executor = executor(
            dir.path(),
            FakeBackend::default(),
            FakeStreaming::default(),
            caps(true, false, true),
        );

        let description = executor.describe("https://open.spotify.com/track/1").await.unwrap();
        assert_eq!(description.title, "Spotify track");
    }
}
