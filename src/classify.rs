//! URL validation and acquisition-class routing
//!
//! Host matching only; nothing here touches the network.

use url::Url;

use crate::error::MediaError;

/// Hosts served by the music-streaming helper instead of the generic extractor
pub const STREAMING_SERVICE_DOMAINS: &[&str] = &["open.spotify.com", "spotify.com"];

/// Hosts that refuse anonymous extraction and need browser cookies
pub const COOKIE_AUTH_DOMAINS: &[&str] = &["youtube.com", "youtu.be"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    StreamingMetadataService,
    GenericMedia { requires_auth_cookies: bool },
}

/// Parse a client-supplied URL, accepting only absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, MediaError> {
    let url = Url::parse(raw.trim()).map_err(|e| MediaError::Validation(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MediaError::Validation(format!(
            "{raw}: only http and https URLs are supported"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(MediaError::Validation(format!("{raw}: missing host")));
    }

    Ok(url)
}

pub fn classify(url: &Url) -> UrlClass {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    if matches_any(&host, STREAMING_SERVICE_DOMAINS) {
        return UrlClass::StreamingMetadataService;
    }

    UrlClass::GenericMedia {
        requires_auth_cookies: matches_any(&host, COOKIE_AUTH_DOMAINS),
    }
}

/// `scheme://host[:port]/`, sent as Referer so CDN checks see a same-origin request
pub fn origin_referer(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}

/// Embed pages are not recognised by site extractors and go to the generic one.
pub fn is_embed_page(url: &Url) -> bool {
    url.path().contains("/embed/")
}

fn matches_any(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}
