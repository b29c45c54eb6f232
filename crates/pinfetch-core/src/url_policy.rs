//! Layer A: parse the caller's URL and enforce HTTPS on the standard port
//! with no embedded credentials.

use crate::error::FetchError;
use url::Url;

const HTTPS_PORT: u16 = 443;

/// Parses `raw` and rejects anything that is not a plain `https://host/...` URL.
pub fn parse_https_url(raw: &str) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::InvalidUrl("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("invalid URL format ({})", e)))?;

    if url.scheme() != "https" {
        return Err(FetchError::InvalidUrl(format!(
            "only HTTPS URLs are allowed (got {}://)",
            url.scheme()
        )));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(FetchError::InvalidUrl(
            "URLs with credentials are not allowed".to_string(),
        ));
    }

    // Url normalizes an explicit :443 to None for https.
    if let Some(port) = url.port() {
        if port != HTTPS_PORT {
            return Err(FetchError::InvalidUrl(format!(
                "only standard HTTPS port (443) is allowed (got {})",
                port
            )));
        }
    }

    match url.host_str() {
        Some(h) if !h.is_empty() => {}
        _ => return Err(FetchError::InvalidUrl("URL has no host".to_string())),
    }

    Ok(url)
}
