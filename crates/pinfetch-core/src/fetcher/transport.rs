//! Layer D: GET over a connection pinned to an already-verified address.
//!
//! libcurl is given a `CURLOPT_RESOLVE` entry for `host:port`, so it dials the
//! pinned IP without a fresh lookup while SNI, certificate checks and the
//! `Host` header still use the hostname. Layers E and F run from the header
//! and write callbacks so a rejected response is aborted before its body is
//! accepted, and an oversized body is aborted mid-stream.
//!
//! Runs in the current thread; call from `spawn_blocking` if used from async code.

use super::head::{HeadLine, ResponseHead};
use crate::control::CancelToken;
use crate::error::FetchError;
use std::net::IpAddr;
use std::str;
use std::time::Duration;
use url::Url;

/// A request that has passed layers A–C, bound to one verified address.
#[derive(Debug, Clone)]
pub(crate) struct PinnedTarget {
    pub(crate) url: Url,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) ip: IpAddr,
}

impl PinnedTarget {
    /// `host:port:address` as libcurl's resolve list expects it.
    pub(crate) fn resolve_entry(&self) -> String {
        match self.ip {
            IpAddr::V4(v4) => format!("{}:{}:{}", self.host, self.port, v4),
            IpAddr::V6(v6) => format!("{}:{}:[{}]", self.host, self.port, v6),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TransferLimits {
    pub(crate) max_bytes: u64,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: String,
}

fn setup(e: curl::Error) -> FetchError {
    FetchError::Transport(format!("curl setup: {}", e))
}

/// Performs the pinned GET. Returns the whole body only if every check passed.
pub(crate) fn fetch_pinned(
    target: &PinnedTarget,
    limits: &TransferLimits,
    cancel: &CancelToken,
) -> Result<Vec<u8>, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let mut easy = curl::easy::Easy::new();
    easy.url(target.url.as_str()).map_err(setup)?;

    let mut pins = curl::easy::List::new();
    pins.append(&target.resolve_entry()).map_err(setup)?;
    easy.resolve(pins).map_err(setup)?;
    // A proxy would resolve the name itself and defeat the pin.
    easy.noproxy("*").map_err(setup)?;

    easy.get(true).map_err(setup)?;
    easy.follow_location(false).map_err(setup)?;
    easy.forbid_reuse(true).map_err(setup)?;
    easy.connect_timeout(limits.timeout).map_err(setup)?;
    easy.timeout(limits.timeout).map_err(setup)?;
    easy.useragent(&limits.user_agent).map_err(setup)?;
    easy.progress(true).map_err(setup)?;

    let max_bytes = limits.max_bytes;
    let mut head = ResponseHead::default();
    let mut head_accepted = false;
    let mut head_rejection: Option<FetchError> = None;
    let mut body: Vec<u8> = Vec::new();
    let mut overflowed = false;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                let line = match str::from_utf8(data) {
                    Ok(s) => s,
                    Err(_) => return true,
                };
                if head.push_line(line) == HeadLine::Complete {
                    match head.check(max_bytes) {
                        Ok(()) => head_accepted = true,
                        Err(e) => {
                            head_rejection = Some(e);
                            return false; // abort before the body
                        }
                    }
                }
                true
            })
            .map_err(setup)?;
        transfer
            .write_function(|data| {
                if body.len() as u64 + data.len() as u64 > max_bytes {
                    overflowed = true;
                    return Ok(0); // abort transfer
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(setup)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(setup)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if let Some(rejection) = head_rejection {
            tracing::warn!("{}: response rejected: {}", target.host, rejection);
            return Err(rejection);
        }
        if overflowed {
            tracing::warn!(
                "{}: body exceeded {} bytes, transfer aborted",
                target.host,
                max_bytes
            );
            return Err(FetchError::SizeLimitExceeded { max: max_bytes });
        }
        if e.is_aborted_by_callback() || cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if e.is_operation_timedout() {
            return Err(FetchError::Timeout(limits.timeout));
        }
        return Err(FetchError::Transport(e.to_string()));
    }

    if !head_accepted {
        head.check(max_bytes)?;
    }

    tracing::debug!(
        "{}: fetched {} bytes via pinned {}",
        target.host,
        body.len(),
        target.ip
    );
    Ok(body)
}
