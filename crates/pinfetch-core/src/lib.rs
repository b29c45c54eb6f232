//! SSRF-hardened fetching of images from an allowlist of trusted HTTPS hosts.
//!
//! Build a [`config::SecurityConfig`] once at startup, share it through an
//! `Arc`, and hand user-supplied URLs to
//! [`fetcher::TrustedImageFetcher::fetch_trusted_image`].

pub mod checksum;
pub mod config;
pub mod control;
pub mod error;
pub mod fetcher;
pub mod ip_policy;
pub mod logging;
pub mod resolver;
pub mod sniff;
pub mod url_model;
pub mod url_policy;

pub use config::SecurityConfig;
pub use control::CancelToken;
pub use error::{ConfigError, FetchError, Layer};
pub use fetcher::{FetchRequest, TrustedImageFetcher};
