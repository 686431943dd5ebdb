//! Format option synthesis
//!
//! Turns the stream list reported by the extraction backend into the short menu
//! of choices offered to clients. The output depends only on the metadata and
//! the merge-tool flag, so the same inputs always give the same list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::backend::MediaInfo;
use crate::capabilities::CapabilitySnapshot;

/// Most resolution choices offered per item
pub const MAX_HEIGHT_OPTIONS: usize = 8;

/// Selector understood by the streaming-service path
pub const STREAMING_AUDIO_SELECTOR: &str = "spotify_audio";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOption {
    pub id: String,
    pub label: String,
    pub format_selector: String,
    pub note: String,
}

impl FormatOption {
    fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        selector: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            format_selector: selector.into(),
            note: note.into(),
        }
    }

    fn audio_only() -> Self {
        Self::new(
            "audio_only",
            "Audio only (music)",
            "bestaudio/best",
            "Best audio quality, no video",
        )
    }
}

/// Default selector when the client did not pick one
pub fn default_selector(caps: &CapabilitySnapshot) -> &'static str {
    if caps.merge_tool_available {
        "bestvideo+bestaudio/best"
    } else {
        "best"
    }
}

/// Build the option menu for one item. Never empty.
pub fn build(info: &MediaInfo, caps: &CapabilitySnapshot) -> Vec<FormatOption> {
    let has_video = info.formats.iter().any(|f| f.has_video());
    let has_audio = info.formats.iter().any(|f| f.has_audio());

    if has_video && has_audio {
        let heights: BTreeSet<u32> = info.formats.iter().filter_map(|f| f.height).collect();
        let top = heights.into_iter().rev().take(MAX_HEIGHT_OPTIONS);

        let mut options: Vec<FormatOption> = if caps.merge_tool_available {
            top.map(|h| {
                FormatOption::new(
                    format!("height_{h}"),
                    format!("{h}p (video + audio)"),
                    format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
                    format!("Up to {h}p, merged"),
                )
            })
            .collect()
        } else {
            top.map(|h| {
                FormatOption::new(
                    format!("height_{h}"),
                    format!("{h}p (video + audio)"),
                    format!("best[height<={h}]"),
                    format!("Up to {h}p (no ffmpeg)"),
                )
            })
            .collect()
        };

        options.push(if caps.merge_tool_available {
            FormatOption::new(
                "best",
                "Best (video + audio)",
                "bestvideo+bestaudio/best",
                "Best available quality",
            )
        } else {
            FormatOption::new(
                "best",
                "Best (video + audio)",
                "best",
                "Best single file (install ffmpeg for more options)",
            )
        });
        options.push(FormatOption::audio_only());
        options
    } else if has_audio {
        vec![FormatOption::new("best_audio", "Best audio", "bestaudio/best", "Audio only")]
    } else {
        vec![FormatOption::new("best", "Best", "best", "Single stream")]
    }
}

/// The single choice offered for music-streaming links
pub fn streaming_service_options() -> Vec<FormatOption> {
    vec![FormatOption::new(
        "audio_only",
        "Audio only (music)",
        STREAMING_AUDIO_SELECTOR,
        "Download as audio via YouTube match",
    )]
}
