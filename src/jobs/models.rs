use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Downloading,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Position in the lifecycle; a job never moves to a lower rank
    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Downloading => 1,
            JobStatus::Done | JobStatus::Error => 2,
        }
    }

    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// One acquisition job as seen by pollers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub result_path: Option<PathBuf>,
    pub display_filename: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    pub fn pending(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0,
            result_path: None,
            display_filename: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a client asked to acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    /// Backend selector; `None` lets the executor pick one
    pub format_selector: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, format_selector: Option<String>) -> Self {
        Self {
            url: url.into(),
            format_selector: format_selector.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_advances() {
        assert!(JobStatus::Pending.can_advance_to(JobStatus::Downloading));
        assert!(JobStatus::Pending.can_advance_to(JobStatus::Error));
        assert!(JobStatus::Downloading.can_advance_to(JobStatus::Downloading));
        assert!(JobStatus::Downloading.can_advance_to(JobStatus::Done));
        assert!(!JobStatus::Downloading.can_advance_to(JobStatus::Pending));
        assert!(!JobStatus::Done.can_advance_to(JobStatus::Error));
        assert!(!JobStatus::Error.can_advance_to(JobStatus::Done));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Downloading).unwrap(), "\"downloading\"");
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"done\"");
    }

    #[test]
    fn blank_selector_means_default() {
        assert_eq!(JobRequest::new("u", Some("  ".to_string())).format_selector, None);
        assert_eq!(
            JobRequest::new("u", Some("best".to_string())).format_selector.as_deref(),
            Some("best")
        );
    }
}
