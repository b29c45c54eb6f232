//! Magic-byte detection for fetched images.
//!
//! The fetcher only trusts the server's `Content-Type`; hosts that store the
//! bytes can use this to confirm what they actually received.

/// Image formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
            ImageKind::Bmp => "image/bmp",
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Bmp => "bmp",
        }
    }

    /// Extensions accepted for this kind (lowercase, no dot).
    pub fn matches_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            ImageKind::Jpeg => ext == "jpg" || ext == "jpeg",
            other => ext == other.extension(),
        }
    }
}

/// Detects the image format from the first bytes of `data`.
pub fn detect(data: &[u8]) -> Option<ImageKind> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageKind::Jpeg);
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some(ImageKind::Png);
    }
    if data.starts_with(b"GIF8") {
        return Some(ImageKind::Gif);
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(ImageKind::Webp);
    }
    if data.starts_with(b"BM") && data.len() >= 14 {
        return Some(ImageKind::Bmp);
    }
    None
}
