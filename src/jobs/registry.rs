//! In-memory job table
//!
//! Every write goes through [`JobRegistry::update`], which keeps three rules no
//! matter what a caller asks for:
//! - progress never decreases and never exceeds 100
//! - status only moves forward through the lifecycle
//! - terminal records (`done`, `error`) are frozen

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

use super::models::{JobState, JobStatus};
use crate::error::{MediaError, Result};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobState>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobState>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobState>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh record, replacing nothing: ids are unique per process.
    pub fn create(&self, state: JobState) {
        debug!(job_id = %state.id, status = ?state.status, "Job registered");
        self.write().entry(state.id.clone()).or_insert(state);
    }

    pub fn get(&self, id: &str) -> Result<JobState> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(id.to_string()))
    }

    /// Apply `mutation` to a copy of the record and store the result, clamped to
    /// the registry rules. Returns the stored state.
    pub fn update<F>(&self, id: &str, mutation: F) -> Result<JobState>
    where
        F: FnOnce(&mut JobState),
    {
        let mut jobs = self.write();
        let current = jobs
            .get_mut(id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;

        if current.status.is_terminal() {
            debug!(job_id = id, status = ?current.status, "Ignoring update to finished job");
            return Ok(current.clone());
        }

        let mut next = current.clone();
        mutation(&mut next);

        next.id = current.id.clone();
        next.created_at = current.created_at;
        next.updated_at = Utc::now();
        next.progress = next.progress.max(current.progress).min(100);
        if !current.status.can_advance_to(next.status) {
            next.status = current.status;
        }
        if next.status != JobStatus::Done {
            next.result_path = None;
            next.display_filename = None;
        }
        if next.status != JobStatus::Error {
            next.error_message = None;
        }

        *current = next;
        Ok(current.clone())
    }

    pub fn set_progress(&self, id: &str, progress: u8) -> Result<JobState> {
        self.update(id, |job| job.progress = progress)
    }

    pub fn mark_downloading(&self, id: &str) -> Result<JobState> {
        self.update(id, |job| job.status = JobStatus::Downloading)
    }

    pub fn complete(&self, id: &str, path: PathBuf, filename: String) -> Result<JobState> {
        self.update(id, |job| {
            job.status = JobStatus::Done;
            job.progress = 100;
            job.result_path = Some(path);
            job.display_filename = Some(filename);
        })
    }

    /// Finish with an error; progress stays where it was.
    pub fn fail(&self, id: &str, message: impl Into<String>) -> Result<JobState> {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        self.update(id, |job| {
            job.status = JobStatus::Error;
            job.error_message = Some(message);
        })
    }

    pub fn remove(&self, id: &str) -> Option<JobState> {
        self.write().remove(id)
    }

    /// Drop terminal jobs last touched more than `ttl` before `now`.
    pub fn prune_expired(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<JobState> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.write();
        let expired: Vec<String> = jobs
            .values()
            .filter(|job| job.status.is_terminal() && job.updated_at < cutoff)
            .map(|job| job.id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
