//! Host capability detection
//!
//! Inspects the machine once at startup for the optional tools that change how a
//! download is planned: a merge tool (ffmpeg), an accelerated downloader
//! (aria2c), browser impersonation support in the extraction backend, JS
//! runtimes, and the music-streaming helper. The resulting
//! [`CapabilitySnapshot`] is immutable and shared by `Arc`.
//!
//! Every check is best-effort: a failing command or a missing binary only clears
//! the corresponding flag.

use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::config::ToolsConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    /// ffmpeg is present, so separate video and audio streams can be merged
    pub merge_tool_available: bool,
    /// aria2c is present for delegated transfers
    pub accelerated_downloader_available: bool,
    /// The extraction backend lists at least one usable impersonation target
    pub impersonation_available: bool,
    /// The impersonation library (curl_cffi) imports in the configured python
    pub impersonation_library_installed: bool,
    /// Available JS engines, in preference order
    pub script_runtimes: Vec<String>,
    /// The music-streaming helper (spotdl) is present
    pub metadata_service_available: bool,
}

impl CapabilitySnapshot {
    /// Run every check. Blocking; call from `spawn_blocking` inside a runtime.
    pub fn detect(tools: &ToolsConfig) -> Self {
        let snapshot = Self {
            merge_tool_available: on_path(&tools.ffmpeg),
            accelerated_downloader_available: on_path(&tools.aria2c),
            impersonation_available: backend_impersonation(&tools.ytdlp),
            impersonation_library_installed: python_imports(&tools.python, "curl_cffi"),
            script_runtimes: tools
                .js_runtimes
                .iter()
                .filter(|name| on_path(name))
                .cloned()
                .collect(),
            metadata_service_available: on_path(&tools.spotdl),
        };

        info!(
            merge = snapshot.merge_tool_available,
            aria2c = snapshot.accelerated_downloader_available,
            impersonation = snapshot.impersonation_available,
            js_runtimes = ?snapshot.script_runtimes,
            spotdl = snapshot.metadata_service_available,
            "Capabilities detected"
        );

        if !snapshot.impersonation_available {
            warn!(
                "Cloudflare/impersonation not available (install: pip install curl_cffi). \
                 Sites behind bot protection may return 403."
            );
        }

        snapshot
    }

    /// Snapshot of a host with none of the optional tools
    pub fn none() -> Self {
        Self::default()
    }
}

fn on_path(binary: &str) -> bool {
    let found = which::which(binary).is_ok();
    debug!(binary, found, "Checked executable");
    found
}

fn backend_impersonation(ytdlp: &str) -> bool {
    Command::new(ytdlp)
        .arg("--list-impersonate-targets")
        .stdin(Stdio::null())
        .output()
        .map(|output| {
            output.status.success()
                && has_usable_impersonate_target(&String::from_utf8_lossy(&output.stdout))
        })
        .unwrap_or(false)
}

fn python_imports(python: &str, module: &str) -> bool {
    Command::new(python)
        .args(["-c", &format!("import {module}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Scan the table printed by `yt-dlp --list-impersonate-targets`.
///
/// Rows follow a dashed separator line; a row whose source column reads
/// `(unavailable)` cannot be used.
pub fn has_usable_impersonate_target(listing: &str) -> bool {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .any(|line| !line.contains("unavailable"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_AVAILABLE: &str = "\
[info] Available impersonate targets
Client      OS             Source
---------------------------------------
Chrome-124  Macos-14       curl_cffi
Safari-17.0 Macos-14       curl_cffi
";

    const LISTING_UNAVAILABLE: &str = "\
[info] Available impersonate targets
Client   OS   Source
---------------------------------------
Chrome   -    curl_cffi (unavailable)
Edge     -    curl_cffi (unavailable)
";

    #[test]
    fn detects_usable_targets() {
        assert!(has_usable_impersonate_target(LISTING_AVAILABLE));
    }

    #[test]
    fn unavailable_rows_do_not_count() {
        assert!(!has_usable_impersonate_target(LISTING_UNAVAILABLE));
    }

    #[test]
    fn empty_listing_has_no_targets() {
        assert!(!has_usable_impersonate_target(""));
        assert!(!has_usable_impersonate_target("[info] Available impersonate targets\n"));
    }

    #[test]
    fn missing_tools_clear_flags() {
        let tools = ToolsConfig {
            ytdlp: "mediabox-test-no-such-ytdlp".to_string(),
            ffmpeg: "mediabox-test-no-such-ffmpeg".to_string(),
            aria2c: "mediabox-test-no-such-aria2c".to_string(),
            spotdl: "mediabox-test-no-such-spotdl".to_string(),
            python: "mediabox-test-no-such-python".to_string(),
            js_runtimes: vec!["mediabox-test-no-such-node".to_string()],
            ..ToolsConfig::default()
        };

        assert_eq!(CapabilitySnapshot::detect(&tools), CapabilitySnapshot::none());
    }
}
