//! Scripted backends for executor and broker tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;

use crate::backend::{
    BackendError, DownloadOptions, DownloadOutcome, MediaBackend, MediaInfo, ProgressEvent,
    ProgressSink, RequestedDownload, SiteOptions, StreamingService,
};

/// Emits `events`, optionally waits on `gate`, writes `produce` and reports `info`.
///
/// `produce` is a file name created next to the output template. Its path is
/// reported as `filepath`, or only through `requested_downloads` when
/// `report_as_requested` is set.
#[derive(Default)]
pub struct FakeBackend {
    pub info: MediaInfo,
    pub events: Vec<ProgressEvent>,
    pub produce: Option<&'static str>,
    pub report_as_requested: bool,
    pub error: Option<BackendError>,
    pub gate: Option<Arc<Notify>>,
    pub seen: Mutex<Vec<DownloadOptions>>,
    pub seen_sites: Mutex<Vec<SiteOptions>>,
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn extract_info(&self, _url: &str, site: &SiteOptions) -> Result<MediaInfo, BackendError> {
        self.seen_sites.lock().unwrap().push(site.clone());
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.info.clone()),
        }
    }

    async fn download(
        &self,
        _url: &str,
        options: &DownloadOptions,
        progress: ProgressSink,
    ) -> Result<DownloadOutcome, BackendError> {
        self.seen.lock().unwrap().push(options.clone());
        for event in &self.events {
            progress(*event);
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut info = self.info.clone();
        if let Some(name) = self.produce {
            let dir = Path::new(&options.output_template).parent().unwrap();
            let path = dir.join(name);
            std::fs::write(&path, b"media").unwrap();
            if self.report_as_requested {
                info.filepath = Some(dir.join("missing.webm"));
                info.requested_downloads = vec![RequestedDownload {
                    filepath: Some(path),
                }];
            } else {
                info.filepath = Some(path);
            }
        }
        Ok(DownloadOutcome { info })
    }
}

/// Writes `files` (name, age) into the work directory.
#[derive(Default)]
pub struct FakeStreaming {
    pub title: Option<String>,
    pub files: Vec<(&'static str, Duration)>,
    pub error: Option<BackendError>,
}

#[async_trait]
impl StreamingService for FakeStreaming {
    async fn fetch_title(&self, _url: &str, _timeout: Duration) -> Result<String, BackendError> {
        match (&self.error, &self.title) {
            (Some(err), _) => Err(err.clone()),
            (None, Some(title)) => Ok(title.clone()),
            (None, None) => Err(BackendError::new(
                crate::backend::BackendErrorKind::Failed,
                "no title",
            )),
        }
    }

    async fn download(
        &self,
        _url: &str,
        workdir: &Path,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        for (name, age) in &self.files {
            let path = workdir.join(name);
            std::fs::write(&path, b"audio").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() - *age).unwrap();
        }
        Ok(())
    }
}
