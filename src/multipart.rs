//! Minimal `multipart/form-data` parser for document uploads.
//!
//! Grammar handled (RFC 2046, simplified):
//!
//! ```text
//! body       := preamble *( delimiter CRLF part ) close-delimiter epilogue
//! delimiter  := "--" boundary
//! close      := delimiter "--"
//! part       := headers CRLF CRLF payload
//! ```
//!
//! Bare `LF` line endings are accepted wherever `CRLF` is expected. The
//! parser works on borrowed bytes and never allocates payload copies.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

/// Stored in place of the payload when an upload carries no usable part.
pub const PLACEHOLDER_CONTENT: &str = "dummy uploaded content";

/// One body part: its headers and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part<'a> {
    pub headers: Vec<(String, String)>,
    pub payload: &'a [u8],
}

impl<'a> Part<'a> {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_form_data(&self) -> bool {
        self.header("content-disposition").is_some()
    }
}

/// Extracts the `boundary` parameter from a `Content-Type` header value.
/// Quotes are stripped; an empty boundary is treated as absent.
pub fn boundary(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let start = lower.find("boundary=")? + "boundary=".len();
    let raw = content_type[start..].split(';').next().unwrap_or_default().trim();
    let value = raw.trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Splits `body` into parts delimited by `--boundary`. Stops at the close
/// delimiter; a body cut off before it yields the parts seen so far, the
/// last one running to the end of input. Parts without a header/payload
/// separator are dropped.
pub fn parse<'a>(body: &'a [u8], boundary: &str) -> Vec<Part<'a>> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();

    let Some(mut pos) = find(body, delimiter, 0) else {
        return parts;
    };

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }
        // Skip the remainder of the delimiter line.
        let Some(line_end) = find(body, b"\n", after) else {
            break;
        };
        let start = line_end + 1;
        let next = find(body, delimiter, start);
        let end = next.unwrap_or(body.len());
        if let Some(part) = parse_part(&body[start..end]) {
            parts.push(part);
        }
        match next {
            Some(n) => pos = n,
            None => break,
        }
    }

    parts
}

fn parse_part(raw: &[u8]) -> Option<Part<'_>> {
    let (head, payload) = match find(raw, b"\r\n\r\n", 0) {
        Some(i) => (&raw[..i], &raw[i + 4..]),
        None => {
            let i = find(raw, b"\n\n", 0)?;
            (&raw[..i], &raw[i + 2..])
        }
    };

    let headers = String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    Some(Part {
        headers,
        payload: trim_line_endings(payload),
    })
}

/// Drops every trailing `\r` and `\n`, including the line break that
/// precedes the next delimiter.
fn trim_line_endings(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Stored text for an uploaded body: the payload of the first form-data
/// part, as UTF-8 text when it is valid UTF-8 and as standard base64
/// otherwise. Falls back to [`PLACEHOLDER_CONTENT`] when there is no
/// boundary, no form-data part, or an empty payload.
pub fn upload_content(body: &[u8], content_type: Option<&str>) -> String {
    let payload = content_type
        .and_then(boundary)
        .and_then(|b| parse(body, &b).into_iter().find(Part::is_form_data))
        .map(|part| part.payload)
        .unwrap_or_default();

    if payload.is_empty() {
        tracing::debug!(bytes = body.len(), "upload carried no usable part");
        return PLACEHOLDER_CONTENT.to_string();
    }

    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => BASE64_STANDARD.encode(payload),
    }
}
