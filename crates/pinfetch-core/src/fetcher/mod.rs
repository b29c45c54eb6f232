//! Trusted image fetcher with layered SSRF protection.
//!
//! Every call runs the same ordered gates and stops at the first failure:
//!
//! - A: URL must be `https`, port 443, no userinfo ([`crate::url_policy`]).
//! - B: host must be on the trusted-domain allowlist.
//! - C: host is resolved (IPv4 and IPv6, best effort per family); every
//!   answer must be a public address ([`crate::ip_policy`]).
//! - D: the GET dials the first verified address via a pinned resolve entry.
//! - E: redirects and non-200 statuses are rejected, never followed.
//! - F: `image/*` content type only; size capped on the declared length and
//!   on the running byte count.
//!
//! Nothing is cached between calls and nothing is retried.

mod head;
#[cfg(test)]
mod test_server;
mod transport;

use crate::config::{normalize_host, FetchSettings, SecurityConfig, DEFAULT_TIMEOUT_SECS};
use crate::control::{CancelOnDrop, CancelToken};
use crate::error::FetchError;
use crate::ip_policy::is_unsafe_ip;
use crate::resolver::{HostResolver, SystemResolver};
use crate::url_policy::parse_https_url;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use transport::{PinnedTarget, TransferLimits};
use url::{Host, Url};

const DEFAULT_USER_AGENT: &str = concat!("pinfetch/", env!("CARGO_PKG_VERSION"));

/// A URL that passed layers A–C. Only [`TrustedImageFetcher::verify`] builds one.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    raw_url: String,
    url: Url,
    host: String,
    verified_ips: Vec<IpAddr>,
}

impl FetchRequest {
    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Normalized (lowercase) hostname that passed the allowlist.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Every resolved address, IPv4 answers first; all are public.
    pub fn verified_ips(&self) -> &[IpAddr] {
        &self.verified_ips
    }

    /// The address the transfer will dial: always the first verified one.
    pub fn pinned_ip(&self) -> IpAddr {
        self.verified_ips[0]
    }

    fn pinned_target(&self) -> PinnedTarget {
        PinnedTarget {
            url: self.url.clone(),
            host: self.host.clone(),
            port: self.url.port_or_known_default().unwrap_or(443),
            ip: self.pinned_ip(),
        }
    }
}

/// Fetches images from trusted HTTPS hosts. Cheap to share: the policy and
/// resolver are behind `Arc` and never mutated.
pub struct TrustedImageFetcher<R: HostResolver = SystemResolver> {
    security: Arc<SecurityConfig>,
    resolver: Arc<R>,
    timeout: Duration,
    user_agent: String,
}

impl<R: HostResolver> Clone for TrustedImageFetcher<R> {
    fn clone(&self) -> Self {
        Self {
            security: Arc::clone(&self.security),
            resolver: Arc::clone(&self.resolver),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl TrustedImageFetcher<SystemResolver> {
    /// Fetcher using the OS resolver.
    pub fn new(security: Arc<SecurityConfig>) -> Self {
        Self::with_resolver(security, Arc::new(SystemResolver))
    }
}

impl<R: HostResolver> TrustedImageFetcher<R> {
    pub fn with_resolver(security: Arc<SecurityConfig>, resolver: Arc<R>) -> Self {
        Self {
            security,
            resolver,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Applies the `[fetch]` config section (timeout, User-Agent).
    pub fn with_settings(mut self, settings: &FetchSettings) -> Self {
        self.timeout = Duration::from_secs(settings.timeout_secs.max(1));
        if let Some(ua) = &settings.user_agent {
            self.user_agent = ua.clone();
        }
        self
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch an image from a user-supplied URL. Returns the full body or the
    /// first gate that rejected it.
    pub async fn fetch_trusted_image(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_trusted_image_with_cancel(raw_url, &CancelToken::new())
            .await
    }

    /// Like [`fetch_trusted_image`](Self::fetch_trusted_image), but `cancel`
    /// aborts the transfer at any point; no partial data is returned.
    pub async fn fetch_trusted_image_with_cancel(
        &self,
        raw_url: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, FetchError> {
        let request = self.verify(raw_url).await?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let result = self.transfer(request.pinned_target(), cancel).await;
        match &result {
            Ok(bytes) => tracing::info!(
                "fetched {} bytes from trusted host {}",
                bytes.len(),
                request.host()
            ),
            Err(e) => tracing::warn!("fetch from {} failed: {}", request.host(), e),
        }
        result
    }

    fn transfer_limits(&self) -> TransferLimits {
        TransferLimits {
            max_bytes: self.security.max_bytes(),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        }
    }

    /// Layers D–F on a blocking thread. Dropping the returned future aborts
    /// the transfer without cancelling `cancel` itself.
    async fn transfer(
        &self,
        target: PinnedTarget,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, FetchError> {
        let limits = self.transfer_limits();
        let token = cancel.child();
        let _abort_on_drop = CancelOnDrop(token.clone());
        tracing::debug!("{}: pinned fetch via {}", target.host, target.ip);

        tokio::task::spawn_blocking(move || transport::fetch_pinned(&target, &limits, &token))
            .await
            .map_err(join_failure)?
    }

    /// Runs layers A–C only: parse, allowlist, resolve and check addresses.
    /// Performs DNS lookups but never contacts the target host.
    pub async fn verify(&self, raw_url: &str) -> Result<FetchRequest, FetchError> {
        let url = parse_https_url(raw_url).map_err(|e| {
            tracing::warn!("rejected URL: {}", e);
            e
        })?;

        let (host, literal) = match url.host() {
            Some(Host::Domain(d)) => (normalize_host(d), None),
            Some(Host::Ipv4(v4)) => (v4.to_string(), Some(IpAddr::V4(v4))),
            Some(Host::Ipv6(v6)) => (v6.to_string(), Some(IpAddr::V6(v6))),
            None => return Err(FetchError::InvalidUrl("URL has no host".to_string())),
        };

        self.require_trusted_host(&host)?;

        let verified_ips = match literal {
            Some(ip) => {
                check_addresses(&[ip])?;
                vec![ip]
            }
            None => self.resolve_and_verify(&host).await?,
        };
        tracing::debug!("{}: verified addresses {:?}", host, verified_ips);

        Ok(FetchRequest {
            raw_url: raw_url.to_string(),
            url,
            host,
            verified_ips,
        })
    }

    /// Layer B.
    fn require_trusted_host(&self, host: &str) -> Result<(), FetchError> {
        if self.security.is_trusted_domain(host) {
            tracing::debug!("{}: allowlisted", host);
            return Ok(());
        }
        tracing::warn!("rejected untrusted domain {}", host);
        Err(FetchError::UntrustedDomain {
            host: host.to_string(),
            trusted: self.security.trusted_domains().map(str::to_string).collect(),
        })
    }

    /// Layer C: both families concurrently; one family failing is tolerated
    /// as long as the other yields addresses.
    async fn resolve_and_verify(&self, host: &str) -> Result<Vec<IpAddr>, FetchError> {
        let (v4, v6) = self.resolver.lookup(host).await;

        let mut addresses: Vec<IpAddr> = Vec::new();
        let mut failure: Option<std::io::Error> = None;
        match v4 {
            Ok(ips) => addresses.extend(ips.into_iter().map(IpAddr::V4)),
            Err(e) => {
                tracing::debug!("{}: IPv4 lookup failed: {}", host, e);
                failure = Some(e);
            }
        }
        match v6 {
            Ok(ips) => addresses.extend(ips.into_iter().map(IpAddr::V6)),
            Err(e) => {
                tracing::debug!("{}: IPv6 lookup failed: {}", host, e);
                failure.get_or_insert(e);
            }
        }

        if addresses.is_empty() {
            let err = match failure {
                Some(e) => FetchError::DnsFailure {
                    host: host.to_string(),
                    reason: e.to_string(),
                },
                None => FetchError::NoAddresses(host.to_string()),
            };
            tracing::warn!("{}", err);
            return Err(err);
        }

        check_addresses(&addresses)?;
        Ok(addresses)
    }
}

fn join_failure(e: tokio::task::JoinError) -> FetchError {
    FetchError::Transport(format!("fetch task failed: {}", e))
}

/// Any single unsafe address rejects the whole set.
fn check_addresses(addresses: &[IpAddr]) -> Result<(), FetchError> {
    if let Some(&ip) = addresses.iter().find(|ip| is_unsafe_ip(**ip)) {
        tracing::warn!("blocked private/reserved address {}", ip);
        return Err(FetchError::UnsafeAddress(ip));
    }
    Ok(())
}
