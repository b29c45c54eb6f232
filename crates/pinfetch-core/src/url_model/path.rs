//! Filename hint from the URL path.

use url::Url;

/// Last non-empty path segment of `url`, or `None` for root/`.`/`..` paths.
/// Query and fragment are ignored.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}
