use thiserror::Error;

/// Errors produced by the acquisition core.
///
/// Job execution failures are stored on the job as the `Display` text of one of
/// these; the API layer maps them onto HTTP responses.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid url: {0}")]
    Validation(String),

    #[error("could not fetch formats: {0}")]
    MetadataFetch(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("{0}")]
    ToolMissing(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0}")]
    ArtifactMissing(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("file not ready or missing")]
    NotReady,

    #[error("download queue is full ({0} jobs waiting)")]
    QueueFull(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MediaError>;
