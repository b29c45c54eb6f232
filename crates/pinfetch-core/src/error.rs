//! Error types for configuration loading and trusted image fetches.

use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Which gate of the fetch pipeline rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// A: URL parsing, scheme, userinfo and port.
    Url,
    /// B: trusted-domain allowlist.
    Allowlist,
    /// C: DNS resolution and address safety.
    Dns,
    /// D: pinned connection (connect errors, timeout, cancellation).
    Transport,
    /// E: redirect and status policy.
    Response,
    /// F: content type and size enforcement.
    Content,
}

/// Failure of a single `fetch_trusted_image` call. No variant carries partial body data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("untrusted domain: {host}. Only allowed domains: {}", .trusted.join(", "))]
    UntrustedDomain { host: String, trusted: Vec<String> },

    #[error("DNS resolution failed for {host}: {reason}")]
    DnsFailure { host: String, reason: String },

    #[error("no IP addresses found for {0}")]
    NoAddresses(String),

    #[error("private/reserved IP blocked: {0}")]
    UnsafeAddress(IpAddr),

    #[error("request error: {0}")]
    Transport(String),

    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("redirects are not allowed (HTTP {0})")]
    RedirectRejected(u32),

    #[error("HTTP {0} error")]
    BadStatus(u32),

    #[error("invalid content type: {0:?}. Expected image/*")]
    InvalidContentType(String),

    #[error("file too large: {declared} bytes (max: {max})")]
    TooLarge { declared: u64, max: u64 },

    #[error("download exceeded size limit: {max} bytes")]
    SizeLimitExceeded { max: u64 },
}

impl FetchError {
    /// The gate that produced this error.
    pub fn layer(&self) -> Layer {
        match self {
            FetchError::InvalidUrl(_) => Layer::Url,
            FetchError::UntrustedDomain { .. } => Layer::Allowlist,
            FetchError::DnsFailure { .. }
            | FetchError::NoAddresses(_)
            | FetchError::UnsafeAddress(_) => Layer::Dns,
            FetchError::Transport(_) | FetchError::Timeout(_) | FetchError::Cancelled => {
                Layer::Transport
            }
            FetchError::RedirectRejected(_) | FetchError::BadStatus(_) => Layer::Response,
            FetchError::InvalidContentType(_)
            | FetchError::TooLarge { .. }
            | FetchError::SizeLimitExceeded { .. } => Layer::Content,
        }
    }

    /// Message safe to hand to an untrusted client: no allowlist contents,
    /// resolved addresses or transport internals.
    pub fn public_message(&self) -> String {
        match self {
            FetchError::InvalidUrl(reason) => format!("invalid URL: {}", reason),
            FetchError::UntrustedDomain { host, .. } => format!("untrusted domain: {}", host),
            FetchError::DnsFailure { host, .. } | FetchError::NoAddresses(host) => {
                format!("could not resolve {}", host)
            }
            FetchError::UnsafeAddress(_) => "destination address is not allowed".to_string(),
            FetchError::Transport(_) => "could not fetch image".to_string(),
            other => other.to_string(),
        }
    }
}

/// Startup-time configuration failure. Fatal: the host process should not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid MAX_UPLOAD_BYTES ({0}). Must be between 1 and 50MB")]
    MaxUploadBytesOutOfRange(u64),

    #[error("invalid MAX_UPLOAD_BYTES {value:?}: {source}")]
    MaxUploadBytesNotANumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("fetch timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("config directory: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn layers_follow_pipeline_order() {
        assert_eq!(FetchError::InvalidUrl("x".into()).layer(), Layer::Url);
        assert_eq!(
            FetchError::UntrustedDomain {
                host: "a".into(),
                trusted: vec![]
            }
            .layer(),
            Layer::Allowlist
        );
        assert_eq!(
            FetchError::UnsafeAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)).layer(),
            Layer::Dns
        );
        assert_eq!(FetchError::Timeout(Duration::from_secs(10)).layer(), Layer::Transport);
        assert_eq!(FetchError::RedirectRejected(302).layer(), Layer::Response);
        assert_eq!(
            FetchError::SizeLimitExceeded { max: 1 }.layer(),
            Layer::Content
        );
    }

    #[test]
    fn untrusted_domain_lists_allowlist_for_operators() {
        let err = FetchError::UntrustedDomain {
            host: "evil.example.com".into(),
            trusted: vec!["a.example.com".into(), "b.example.com".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("evil.example.com"));
        assert!(msg.contains("a.example.com, b.example.com"));
    }

    #[test]
    fn public_message_scrubs_configuration() {
        let err = FetchError::UntrustedDomain {
            host: "evil.example.com".into(),
            trusted: vec!["secret-cdn.internal".into()],
        };
        assert!(!err.public_message().contains("secret-cdn"));

        let err = FetchError::UnsafeAddress("10.0.0.7".parse().unwrap());
        assert!(!err.public_message().contains("10.0.0.7"));
    }
}
