//! Local filename derivation for fetched images.
//!
//! Derives a safe filename from the URL path, sanitized for Linux
//! filesystems, with the extension taken from the sniffed image format when
//! the URL does not carry a matching one.

mod path;
mod sanitize;

pub use path::filename_from_url;
pub use sanitize::sanitize_filename_for_linux;

use crate::sniff::ImageKind;
use url::Url;

/// Stem used when the URL path yields nothing usable.
const DEFAULT_STEM: &str = "image";

/// Derives a safe filename for saving a fetched image.
///
/// # Examples
///
/// - `https://images.example.com/p/joker.jpg` + Jpeg → `"joker.jpg"`
/// - `https://images.example.com/p/joker` + Png → `"joker.png"`
/// - `https://images.example.com/p/joker.php` + Gif → `"joker.php.gif"`
/// - `https://images.example.com/` + None → `"image.bin"`
pub fn derive_image_filename(url: &Url, kind: Option<ImageKind>) -> String {
    let stem = filename_from_url(url)
        .map(|raw| sanitize_filename_for_linux(&raw))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STEM.to_string());

    let kind = match kind {
        Some(k) => k,
        None if stem == DEFAULT_STEM => return format!("{}.bin", DEFAULT_STEM),
        None => return stem,
    };

    let has_matching_ext = stem
        .rsplit_once('.')
        .map(|(_, ext)| kind.matches_extension(ext))
        .unwrap_or(false);
    if has_matching_ext {
        stem
    } else {
        format!("{}.{}", stem, kind.extension())
    }
}
