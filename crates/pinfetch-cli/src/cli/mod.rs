//! CLI for the pinfetch trusted image fetcher.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinfetch_core::config::{self, PinfetchConfig};
use pinfetch_core::TrustedImageFetcher;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_check, run_fetch, run_show_config};

/// Top-level CLI for pinfetch.
#[derive(Debug, Parser)]
#[command(name = "pinfetch")]
#[command(about = "pinfetch: fetch images from trusted HTTPS hosts with SSRF protection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch an image from a trusted HTTPS URL and save it.
    Fetch {
        /// HTTPS URL of the image.
        url: String,
        /// Output file (default: derived from the URL path in the current directory).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Overwrite the output file if it exists.
        #[arg(long)]
        force: bool,
    },

    /// Validate a URL (scheme, allowlist, DNS/IP checks) without fetching it.
    Check {
        /// HTTPS URL to check.
        url: String,
    },

    /// Print the effective configuration (file plus environment overrides).
    Config,
}

fn build_fetcher(cfg: &PinfetchConfig) -> Result<TrustedImageFetcher> {
    let security = cfg
        .security_config()
        .context("invalid [security] configuration")?;
    Ok(TrustedImageFetcher::new(Arc::new(security)).with_settings(&cfg.fetch))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init().context("load configuration")?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch { url, output, force } => {
                let fetcher = build_fetcher(&cfg)?;
                let download_dir = std::env::current_dir()?;
                run_fetch(&fetcher, &url, output.as_deref(), &download_dir, force).await?;
            }
            CliCommand::Check { url } => {
                let fetcher = build_fetcher(&cfg)?;
                run_check(&fetcher, &url).await?;
            }
            CliCommand::Config => run_show_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
