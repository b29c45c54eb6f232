//! Fetch command: fetch through every gate, then save the bytes.

use anyhow::{Context, Result};
use pinfetch_core::resolver::HostResolver;
use pinfetch_core::url_model::derive_image_filename;
use pinfetch_core::{checksum, sniff, url_policy, TrustedImageFetcher};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fetch `url` and write it to `output`, or to a name derived from the URL
/// inside `download_dir`. Refuses to overwrite unless `force` is set.
pub async fn run_fetch<R: HostResolver>(
    fetcher: &TrustedImageFetcher<R>,
    url: &str,
    output: Option<&Path>,
    download_dir: &Path,
    force: bool,
) -> Result<()> {
    let bytes = fetcher.fetch_trusted_image(url).await?;

    let kind = sniff::detect(&bytes);
    if kind.is_none() {
        tracing::warn!("{}: body does not look like a known image format", url);
    }

    let path = output_path(url, kind, output, download_dir)?;
    save(&path, &bytes, force)?;

    println!(
        "saved {} bytes ({}) to {}",
        bytes.len(),
        kind.map(|k| k.mime_type()).unwrap_or("unknown format"),
        path.display()
    );
    println!("sha256 {}", checksum::sha256_hex(&bytes));
    Ok(())
}

pub(crate) fn output_path(
    url: &str,
    kind: Option<sniff::ImageKind>,
    output: Option<&Path>,
    download_dir: &Path,
) -> Result<PathBuf> {
    if let Some(p) = output {
        return Ok(p.to_path_buf());
    }
    let parsed = url_policy::parse_https_url(url)?;
    Ok(download_dir.join(derive_image_filename(&parsed, kind)))
}

pub(crate) fn save(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true);
    if force {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    let mut file = opts
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
