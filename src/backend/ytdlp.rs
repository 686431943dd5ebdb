//! yt-dlp command-line adapter

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::process::{run_captured, stdout_or_error};
use super::{
    BackendError, BackendErrorKind, DownloadOptions, DownloadOutcome, MediaBackend, MediaInfo,
    ProgressEvent, ProgressSink, SiteOptions,
};

const PROGRESS_MARKER: &str = "mediabox-progress";

const PROGRESS_TEMPLATE: &str = "download:mediabox-progress %(progress.status)s \
    %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s";

#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    program: String,
}

impl YtDlpBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    async fn extract_info(&self, url: &str, site: &SiteOptions) -> Result<MediaInfo, BackendError> {
        let args = metadata_args(url, site);
        let output = run_captured(&self.program, &args, None, None).await?;
        let stdout = stdout_or_error(output)?;

        serde_json::from_str(stdout.trim()).map_err(|e| {
            BackendError::new(
                BackendErrorKind::Failed,
                format!("unreadable metadata from {}: {e}", self.program),
            )
        })
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: ProgressSink,
    ) -> Result<DownloadOutcome, BackendError> {
        let args = download_args(url, options);
        debug!(program = %self.program, ?args, "Starting download");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::spawn(&self.program, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Spawn, "yt-dlp stdout not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Spawn, "yt-dlp stderr not captured")
        })?;

        // Progress lines can land on either stream depending on quiet mode
        let stdout_progress = progress.clone();
        let stdout_reader = tokio::spawn(async move {
            let mut info_line = None;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    stdout_progress(event);
                } else if line.trim_start().starts_with('{') {
                    info_line = Some(line);
                }
            }
            info_line
        });

        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    progress(event);
                    continue;
                }
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        let status = child
            .wait()
            .await
            .map_err(|e| BackendError::spawn(&self.program, e))?;
        let info_line = stdout_reader.await.unwrap_or_default();
        let stderr = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            warn!(program = %self.program, ?status, "Download process failed");
            return Err(BackendError::from_stderr(&stderr));
        }

        let line = info_line.ok_or_else(|| {
            BackendError::new(BackendErrorKind::Failed, "yt-dlp reported no file metadata")
        })?;
        let info = serde_json::from_str(&line).map_err(|e| {
            BackendError::new(
                BackendErrorKind::Failed,
                format!("unreadable metadata from {}: {e}", self.program),
            )
        })?;

        Ok(DownloadOutcome { info })
    }
}

/// Flags shaping how a site is contacted
pub fn site_args(site: &SiteOptions) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(target) = &site.impersonate {
        args.push("--extractor-args".to_string());
        args.push(format!("generic:impersonate={target}"));
    }
    for (name, value) in &site.headers {
        args.push("--add-headers".to_string());
        args.push(format!("{name}:{value}"));
    }
    if site.force_generic_extractor {
        args.push("--force-generic-extractor".to_string());
    }
    if let Some(browser) = &site.cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.clone());
    }
    for runtime in &site.js_runtimes {
        args.push("--js-runtimes".to_string());
        args.push(runtime.clone());
    }

    args
}

pub fn metadata_args(url: &str, site: &SiteOptions) -> Vec<String> {
    let mut args = vec![
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
        "--no-playlist".to_string(),
    ];
    args.extend(site_args(site));
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        options.format.clone(),
        "-o".to_string(),
        options.output_template.clone(),
        "--concurrent-fragments".to_string(),
        options.concurrent_fragments.to_string(),
        "--buffer-size".to_string(),
        options.buffer_size.to_string(),
        "--http-chunk-size".to_string(),
        options.http_chunk_size.to_string(),
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "--print".to_string(),
        "after_move:%()j".to_string(),
        "--no-simulate".to_string(),
    ];

    if let Some(container) = &options.merge_output_format {
        args.push("--merge-output-format".to_string());
        args.push(container.clone());
    }
    if let Some(downloader) = &options.external_downloader {
        args.push("--downloader".to_string());
        args.push(downloader.name.clone());
        args.push("--downloader-args".to_string());
        args.push(format!("{}:{}", downloader.name, downloader.args.join(" ")));
    }

    args.extend(site_args(&options.site));
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Parse one line printed through [`PROGRESS_TEMPLATE`].
///
/// Missing numbers print as `NA`; estimates may be fractional.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.split_whitespace();

    match fields.next()? {
        "downloading" => {
            let downloaded_bytes = fields.next().and_then(parse_byte_count).unwrap_or(0);
            let total = fields.next().and_then(parse_byte_count);
            let estimate = fields.next().and_then(parse_byte_count);
            Some(ProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes: total.or(estimate).filter(|t| *t > 0),
            })
        }
        "finished" => Some(ProgressEvent::Finished),
        _ => None,
    }
}

fn parse_byte_count(field: &str) -> Option<u64> {
    let value: f64 = field.parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
