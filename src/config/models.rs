use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Directory with a prebuilt frontend, served for unmatched paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// Where job artifacts are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
        }
    }
}

fn default_downloads_dir() -> PathBuf {
    std::env::temp_dir().join("media-downloader")
}

/// External executables and how to drive them
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ytdlp")]
    pub ytdlp: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_aria2c")]
    pub aria2c: String,
    #[serde(default = "default_spotdl")]
    pub spotdl: String,
    /// Interpreter used to check whether `curl_cffi` is importable
    #[serde(default = "default_python")]
    pub python: String,
    /// JavaScript runtimes to look for, in order of preference
    #[serde(default = "default_js_runtimes")]
    pub js_runtimes: Vec<String>,
    /// Browser whose cookie jar is used for hosts that demand sign-in
    #[serde(default = "default_cookies_browser")]
    pub cookies_browser: String,
    #[serde(default = "default_impersonate_target")]
    pub impersonate_target: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: default_ytdlp(),
            ffmpeg: default_ffmpeg(),
            aria2c: default_aria2c(),
            spotdl: default_spotdl(),
            python: default_python(),
            js_runtimes: default_js_runtimes(),
            cookies_browser: default_cookies_browser(),
            impersonate_target: default_impersonate_target(),
        }
    }
}

fn default_ytdlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_aria2c() -> String {
    "aria2c".to_string()
}

fn default_spotdl() -> String {
    "spotdl".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_js_runtimes() -> Vec<String> {
    vec!["deno".to_string(), "node".to_string()]
}

fn default_cookies_browser() -> String {
    "chrome".to_string()
}

fn default_impersonate_target() -> String {
    "chrome".to_string()
}

/// Throughput tuning handed to the extraction backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: ByteSize,
    #[serde(default = "default_http_chunk_size")]
    pub http_chunk_size: ByteSize,
    /// aria2c connections per server; distro builds cap this at 16
    #[serde(default = "default_aria2c_connections")]
    pub aria2c_connections: u32,
    #[serde(default = "default_aria2c_splits")]
    pub aria2c_splits: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_fragments: default_concurrent_fragments(),
            buffer_size: default_buffer_size(),
            http_chunk_size: default_http_chunk_size(),
            aria2c_connections: default_aria2c_connections(),
            aria2c_splits: default_aria2c_splits(),
        }
    }
}

fn default_concurrent_fragments() -> u32 {
    5000
}

fn default_buffer_size() -> ByteSize {
    ByteSize::mib(4)
}

fn default_http_chunk_size() -> ByteSize {
    ByteSize::mib(100)
}

fn default_aria2c_connections() -> u32 {
    16
}

fn default_aria2c_splits() -> u32 {
    5000
}

/// Bounds for the music-streaming helper tool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_metadata_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    300
}

/// What to do when the admission queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Fail the submission immediately
    #[default]
    Reject,
    /// Wait for a free slot
    Block,
}

/// Worker pool sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            admission: AdmissionPolicy::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

/// Retention of finished jobs and their artifacts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_ttl_secs: default_job_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
