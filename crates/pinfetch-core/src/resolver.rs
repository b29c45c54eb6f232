//! Hostname resolution for Layer C.
//!
//! The fetcher only depends on this trait and does not know how names are
//! answered; the system resolver is the default, a static table is used for
//! hosts-file style overrides and tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answer for both families of one name; each side fails on its own.
pub type FamilyAnswers = (io::Result<Vec<Ipv4Addr>>, io::Result<Vec<Ipv6Addr>>);

/// Address family of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Per-family DNS lookups. Each family is queried independently so that a
/// failure on one does not hide answers from the other.
pub trait HostResolver: Send + Sync + 'static {
    fn lookup_ipv4(&self, host: &str) -> impl Future<Output = io::Result<Vec<Ipv4Addr>>> + Send;
    fn lookup_ipv6(&self, host: &str) -> impl Future<Output = io::Result<Vec<Ipv6Addr>>> + Send;

    /// Both families at once. The default runs the two lookups concurrently;
    /// resolvers that get both families from one query override it.
    fn lookup(&self, host: &str) -> impl Future<Output = FamilyAnswers> + Send {
        async move { tokio::join!(self.lookup_ipv4(host), self.lookup_ipv6(host)) }
    }
}

/// Resolver backed by the OS (`getaddrinfo` through tokio).
///
/// tokio's `lookup_host` cannot ask for one family, so the per-family
/// methods each cost a full query. The fetcher goes through [`HostResolver::lookup`],
/// which this resolver answers with a single query split by family.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    async fn lookup_all(host: &str) -> io::Result<Vec<IpAddr>> {
        // Port is irrelevant for the answer; 443 keeps getaddrinfo happy.
        let addrs = tokio::net::lookup_host((host, 443)).await?;
        Ok(addrs.map(|sa| sa.ip()).collect())
    }
}

fn split_families(all: Vec<IpAddr>) -> (Vec<Ipv4Addr>, Vec<Ipv6Addr>) {
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    for ip in all {
        match ip {
            IpAddr::V4(a) => v4.push(a),
            IpAddr::V6(a) => v6.push(a),
        }
    }
    (v4, v6)
}

impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> FamilyAnswers {
        match Self::lookup_all(host).await {
            Ok(all) => {
                let (v4, v6) = split_families(all);
                (Ok(v4), Ok(v6))
            }
            // One AF_UNSPEC query failed, so neither family has an answer.
            Err(e) => {
                let copy = io::Error::new(e.kind(), e.to_string());
                (Err(e), Err(copy))
            }
        }
    }

    async fn lookup_ipv4(&self, host: &str) -> io::Result<Vec<Ipv4Addr>> {
        Ok(split_families(Self::lookup_all(host).await?).0)
    }

    async fn lookup_ipv6(&self, host: &str) -> io::Result<Vec<Ipv6Addr>> {
        Ok(split_families(Self::lookup_all(host).await?).1)
    }
}

/// Fixed host -> addresses table. Unknown hosts fail with `NotFound`.
/// Counts lookups so callers can assert that no resolution happened.
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
    failing: HashSet<(String, AddressFamily)>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the answer for `host`. Host matching is case-insensitive.
    pub fn with_host<I>(mut self, host: &str, addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.entries
            .insert(host.trim().to_ascii_lowercase(), addrs.into_iter().collect());
        self
    }

    /// Makes lookups of `family` for `host` fail, whatever the table holds.
    pub fn with_failing_family(mut self, host: &str, family: AddressFamily) -> Self {
        self.failing
            .insert((host.trim().to_ascii_lowercase(), family));
        self
    }

    /// Number of per-family lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn answer(&self, host: &str, family: AddressFamily) -> io::Result<&[IpAddr]> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = host.trim().to_ascii_lowercase();
        if self.failing.contains(&(key.clone(), family)) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{:?} lookup failed for {}", family, host),
            ));
        }
        self.entries
            .get(&key)
            .map(Vec::as_slice)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no record for {}", host)))
    }
}

impl HostResolver for StaticResolver {
    async fn lookup_ipv4(&self, host: &str) -> io::Result<Vec<Ipv4Addr>> {
        Ok(self
            .answer(host, AddressFamily::V4)?
            .iter()
            .filter_map(|ip| match ip {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            })
            .collect())
    }

    async fn lookup_ipv6(&self, host: &str) -> io::Result<Vec<Ipv6Addr>> {
        Ok(self
            .answer(host, AddressFamily::V6)?
            .iter()
            .filter_map(|ip| match ip {
                IpAddr::V6(v6) => Some(*v6),
                IpAddr::V4(_) => None,
            })
            .collect())
    }
}
