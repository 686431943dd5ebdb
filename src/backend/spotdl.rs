//! spotdl command-line adapter for music-streaming links

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::process::{run_captured, stdout_or_error};
use super::{BackendError, BackendErrorKind, StreamingService};

/// Output template handed to `spotdl download`
const OUTPUT_TEMPLATE: &str = "{title}.{output-ext}";

#[derive(Debug, Clone)]
pub struct SpotdlService {
    program: String,
    /// Where metadata save-files are written and removed again
    scratch_dir: PathBuf,
}

impl SpotdlService {
    pub fn new(program: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    fn check_timeout(&self, err: BackendError, what: &str) -> BackendError {
        if err.kind == BackendErrorKind::Timeout {
            BackendError::timeout(format!("Spotify {what}"))
        } else {
            err
        }
    }
}

#[async_trait]
impl StreamingService for SpotdlService {
    async fn fetch_title(&self, url: &str, timeout: Duration) -> Result<String, BackendError> {
        let save_file = self
            .scratch_dir
            .join(format!("{}.spotdl", Uuid::new_v4().simple()));
        let args = vec![
            "save".to_string(),
            url.to_string(),
            "--save-file".to_string(),
            save_file.to_string_lossy().into_owned(),
        ];

        let result = run_captured(&self.program, &args, Some(&self.scratch_dir), Some(timeout))
            .await
            .map_err(|e| self.check_timeout(e, "metadata lookup"))
            .and_then(stdout_or_error);

        let contents = tokio::fs::read_to_string(&save_file).await;
        if let Err(e) = tokio::fs::remove_file(&save_file).await {
            debug!(path = %save_file.display(), error = %e, "Save file not removed");
        }
        result?;

        let contents = contents.map_err(|e| {
            BackendError::new(BackendErrorKind::Failed, format!("no metadata saved: {e}"))
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| {
            BackendError::new(BackendErrorKind::Failed, format!("unreadable metadata: {e}"))
        })?;

        track_title(&value)
            .ok_or_else(|| BackendError::new(BackendErrorKind::Failed, "metadata has no track name"))
    }

    async fn download(
        &self,
        url: &str,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let args = vec![
            "download".to_string(),
            url.to_string(),
            "--output".to_string(),
            OUTPUT_TEMPLATE.to_string(),
        ];

        let output = run_captured(&self.program, &args, Some(workdir), Some(timeout))
            .await
            .map_err(|e| self.check_timeout(e, "download"))?;
        stdout_or_error(output)?;
        Ok(())
    }
}

/// Title of the first track in a save-file: `"<name> - <first artist>"`.
///
/// Save-files hold either one song object or a list of them.
pub fn track_title(value: &Value) -> Option<String> {
    let first = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let song = first.as_object()?;

    let name = ["name", "title", "song"]
        .iter()
        .filter_map(|key| song.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())?;

    let artist = match song.get("artists").or_else(|| song.get("artist")) {
        Some(Value::Array(artists)) => artists.first().and_then(|a| match a {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        }),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    };

    Some(match artist.filter(|a| !a.is_empty()) {
        Some(artist) => format!("{name} - {artist}"),
        None => name.to_string(),
    })
}
