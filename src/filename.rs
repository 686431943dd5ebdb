//! Display filenames for finished artifacts

use std::path::Path;

use crate::backend::MediaInfo;

pub const MAX_FILENAME_LEN: usize = 200;

const FALLBACK_NAME: &str = "media";
const DEFAULT_EXTENSION: &str = ".mp4";

/// Strip characters that are invalid in filenames on common systems.
///
/// Removes `< > : " / \ | ? *` and ASCII control characters, trims whitespace
/// and periods from both ends and caps the length. Never returns an empty
/// string.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|&c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_ascii_control())
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    trimmed.chars().take(MAX_FILENAME_LEN).collect()
}

/// Choose the name a client sees for `path`.
pub fn resolve(info: &MediaInfo, path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .or_else(|| info.ext.clone().filter(|e| !e.is_empty()))
        .map(|e| format!(".{e}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let title = [&info.title, &info.fulltitle, &info.track]
        .into_iter()
        .flatten()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| title_from_stem(info, path));

    let filename = format!("{}{ext}", sanitize(&title));
    if filename == DEFAULT_EXTENSION {
        return basename(path);
    }
    filename
}

/// Output templates write `<id>_<title>.<ext>`; recover the title part.
fn title_from_stem(info: &MediaInfo, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stripped = info
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .and_then(|id| stem.strip_prefix(id))
        .and_then(|rest| rest.strip_prefix('_'))
        .map(|rest| rest.trim().to_string());

    match stripped {
        Some(title) => title,
        None if stem.is_empty() => FALLBACK_NAME.to_string(),
        None => stem,
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{FALLBACK_NAME}{DEFAULT_EXTENSION}"))
}
