//! Response head tracking and the Layer E/F checks that run before any body
//! byte is accepted.

use crate::error::FetchError;

/// Status and the headers the policy looks at, built line by line from
/// libcurl's header callback.
#[derive(Debug, Default, Clone)]
pub(crate) struct ResponseHead {
    pub(crate) status: Option<u32>,
    pub(crate) content_type: Option<String>,
    pub(crate) content_length: Option<u64>,
}

/// What a header line means for the transfer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HeadLine {
    /// More header lines expected.
    Continue,
    /// Blank line ending a final (non-1xx) response head.
    Complete,
}

impl ResponseHead {
    /// Feeds one raw header line. A status line starts a new head, so interim
    /// `1xx` responses are discarded.
    pub(crate) fn push_line(&mut self, raw: &str) -> HeadLine {
        let line = raw.trim();
        if line.is_empty() {
            return match self.status {
                Some(code) if (100..200).contains(&code) => {
                    *self = ResponseHead::default();
                    HeadLine::Continue
                }
                Some(_) => HeadLine::Complete,
                None => HeadLine::Continue,
            };
        }
        if let Some(code) = parse_status_line(line) {
            *self = ResponseHead {
                status: Some(code),
                ..ResponseHead::default()
            };
            return HeadLine::Continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-type") {
                self.content_type = Some(value.to_string());
            }
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    self.content_length = Some(n);
                }
            }
        }
        HeadLine::Continue
    }

    /// Layer E (redirects, status) then Layer F (content type, declared size).
    pub(crate) fn check(&self, max_bytes: u64) -> Result<(), FetchError> {
        let code = self
            .status
            .ok_or_else(|| FetchError::Transport("response had no status line".to_string()))?;
        if (300..400).contains(&code) {
            return Err(FetchError::RedirectRejected(code));
        }
        if code != 200 {
            return Err(FetchError::BadStatus(code));
        }

        let content_type = self.content_type.as_deref().unwrap_or("");
        if !is_image_content_type(content_type) {
            return Err(FetchError::InvalidContentType(content_type.to_string()));
        }

        if let Some(declared) = self.content_length {
            if declared > max_bytes {
                return Err(FetchError::TooLarge {
                    declared,
                    max: max_bytes,
                });
            }
        }
        Ok(())
    }
}

fn is_image_content_type(value: &str) -> bool {
    value
        .trim_start()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("image/"))
        .unwrap_or(false)
}

/// `HTTP/1.1 200 OK` or `HTTP/2 200` -> 200.
fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
