use thiserror::Error;

use super::models::{DownloadRequest, UrlInput};
use crate::jobs::JobRequest;

pub const MAX_URL_LEN: usize = 4096;
pub const MAX_SELECTOR_LEN: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("url exceeds {MAX_URL_LEN} characters")]
    UrlTooLong,
    #[error("formatSelector exceeds {MAX_SELECTOR_LEN} characters")]
    SelectorTooLong,
    #[error("formatSelector must not contain control characters")]
    SelectorControlChars,
}

/// Shape checks only; scheme and host are checked by the classifier.
pub fn validate_url_input(input: &UrlInput) -> Result<String, RequestValidationError> {
    check_url(&input.url)
}

pub fn validate_download_request(
    request: &DownloadRequest,
) -> Result<JobRequest, RequestValidationError> {
    let url = check_url(&request.url)?;

    if let Some(selector) = &request.format_selector {
        if selector.chars().count() > MAX_SELECTOR_LEN {
            return Err(RequestValidationError::SelectorTooLong);
        }
        if selector.chars().any(char::is_control) {
            return Err(RequestValidationError::SelectorControlChars);
        }
    }

    Ok(JobRequest::new(url, request.format_selector.clone()))
}

fn check_url(raw: &str) -> Result<String, RequestValidationError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(RequestValidationError::MissingUrl);
    }
    if url.len() > MAX_URL_LEN {
        return Err(RequestValidationError::UrlTooLong);
    }
    Ok(url.to_string())
}
