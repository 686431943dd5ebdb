//! Eviction of finished jobs and their files

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::registry::JobRegistry;
use crate::config::RetentionConfig;
use crate::observability::Metrics;

/// Remove terminal jobs older than `ttl` and delete their artifacts.
///
/// Returns the number of jobs removed. Each artifact lives in its own
/// sub-directory of `downloads_dir`; that directory goes with it, along with
/// any partial files the backend left behind.
pub async fn sweep_once(
    registry: &JobRegistry,
    ttl: Duration,
    downloads_dir: &Path,
    metrics: &Metrics,
) -> usize {
    let expired = registry.prune_expired(ttl, Utc::now());

    for job in &expired {
        let Some(path) = &job.result_path else {
            continue;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(job_id = %job.id, path = %path.display(), "Artifact removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job.id, path = %path.display(), error = %e, "Artifact not removed"),
        }

        let job_dir = path
            .parent()
            .filter(|p| *p != downloads_dir && p.starts_with(downloads_dir));
        if let Some(job_dir) = job_dir {
            if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(job_id = %job.id, path = %job_dir.display(), error = %e, "Job directory not removed");
                }
            }
        }
    }

    if !expired.is_empty() {
        info!(count = expired.len(), "Pruned expired jobs");
        metrics.jobs_pruned(expired.len() as u64);
    }
    expired.len()
}

/// Run [`sweep_once`] every `sweep_interval_secs` until the runtime stops.
pub fn spawn_sweeper(
    registry: Arc<JobRegistry>,
    config: &RetentionConfig,
    downloads_dir: PathBuf,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    let ttl = Duration::from_secs(config.job_ttl_secs);
    let period = Duration::from_secs(config.sweep_interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            sweep_once(&registry, ttl, &downloads_dir, &metrics).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::models::JobState;
    use tempfile::TempDir;

    #[tokio::test]
    async fn sweep_removes_expired_artifacts() {
        let dir = TempDir::new().unwrap();
        let job_dir = dir.path().join("job-subdir");
        std::fs::create_dir(&job_dir).unwrap();
        let nested = job_dir.join("song.mp3");
        let flat = dir.path().join("abc_clip.mp4");
        std::fs::write(&nested, b"a").unwrap();
        std::fs::write(&flat, b"v").unwrap();

        let registry = JobRegistry::new();
        let metrics = Metrics::new();
        for (id, path) in [("a", &nested), ("b", &flat)] {
            registry.create(JobState::pending(id));
            registry
                .complete(id, path.clone(), "x".to_string())
                .unwrap();
        }
        registry.create(JobState::pending("running"));

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = sweep_once(&registry, Duration::ZERO, dir.path(), &metrics).await;

        assert_eq!(removed, 2);
        assert!(!nested.exists());
        assert!(!job_dir.exists());
        assert!(!flat.exists());
        assert!(dir.path().exists());
        assert_eq!(registry.len(), 1);
        assert_eq!(metrics.snapshot().jobs_pruned, 2);
    }

    #[tokio::test]
    async fn expiring_job_leaves_newer_same_name_artifact() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let metrics = Metrics::new();

        let mut paths = Vec::new();
        for id in ["old", "new"] {
            let job_dir = dir.path().join(format!("dir-{id}"));
            std::fs::create_dir(&job_dir).unwrap();
            let path = job_dir.join("abc_Clip.mp4");
            std::fs::write(&path, id).unwrap();
            std::fs::write(job_dir.join("abc_Clip.f137.mp4.part"), b"x").unwrap();

            registry.create(JobState::pending(id));
            registry.complete(id, path.clone(), "Clip.mp4".to_string()).unwrap();
            paths.push(path);
            if id == "old" {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        }

        let removed = sweep_once(&registry, Duration::from_millis(150), dir.path(), &metrics).await;

        assert_eq!(removed, 1);
        assert!(!paths[0].parent().unwrap().exists());
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"new");
        assert!(registry.get("new").is_ok());
    }

    #[tokio::test]
    async fn fresh_jobs_survive() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let metrics = Metrics::new();
        registry.create(JobState::pending("a"));
        registry.fail("a", "boom").unwrap();

        let removed = sweep_once(&registry, Duration::from_secs(3600), dir.path(), &metrics).await;
        assert_eq!(removed, 0);
        assert_eq!(registry.len(), 1);
    }
}
