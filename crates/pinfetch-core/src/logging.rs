//! Tracing setup for pinfetch hosts.
//!
//! Events go to `$XDG_STATE_HOME/pinfetch/pinfetch.log` when that file can be
//! opened; hosts fall back to [`init_logging_stderr`] otherwise. Verbosity
//! comes from `PINFETCH_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`].

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Filter used when neither variable holds a valid directive.
pub const DEFAULT_FILTER: &str = "info,pinfetch=debug,pinfetch_core=debug";

/// Preferred filter variable; `RUST_LOG` is the fallback.
pub const ENV_LOG_FILTER: &str = "PINFETCH_LOG";

/// Picks the first valid directive from `PINFETCH_LOG` and `RUST_LOG`.
/// An unparseable value is skipped rather than silencing all logs.
fn filter_from<F>(lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    [ENV_LOG_FILTER, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn env_filter() -> EnvFilter {
    filter_from(|key| std::env::var(key).ok())
}

/// Where file logging writes; the state directory is created if missing.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pinfetch")?;
    xdg_dirs
        .place_state_file("pinfetch.log")
        .context("create pinfetch state directory")
}

/// Installs the global subscriber writing to [`log_file_path`].
/// Errors (unwritable state dir, subscriber already set) are returned so the
/// host can fall back to stderr.
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("pinfetch logging to {}", path.display());
    Ok(())
}

/// Stderr-only logging. Never fails; a subscriber that is already set wins.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn default_filter_when_unset() {
        assert_eq!(
            filter_from(vars(&[])).to_string(),
            EnvFilter::new(DEFAULT_FILTER).to_string()
        );
    }

    #[test]
    fn pinfetch_log_wins_over_rust_log() {
        let filter = filter_from(vars(&[("RUST_LOG", "trace"), ("PINFETCH_LOG", "warn")]));
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn invalid_directive_falls_through() {
        let filter = filter_from(vars(&[("PINFETCH_LOG", "pinfetch=loud"), ("RUST_LOG", "error")]));
        assert_eq!(filter.to_string(), "error");
    }
}
