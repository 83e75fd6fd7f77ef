//! Plain text (`.txt`, `.md`, `.csv`, `text/*`).

use super::{truncate_chars, MAX_TITLE_CHARS};
use crate::models::Extracted;

pub const FALLBACK_TITLE: &str = "Text document";

/// Decodes `bytes` as UTF-8, replacing invalid sequences, and titles the
/// document with its first non-empty line.
pub fn extract_text(bytes: &[u8]) -> Extracted {
    let decoded = String::from_utf8_lossy(bytes);
    let content = decoded.trim_start_matches('\u{feff}').trim();

    let title = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| truncate_chars(line, MAX_TITLE_CHARS).to_string())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    Extracted::new(title, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_line_is_title() {
        let out = extract_text(b"\n\n  Release notes  \nline two\n");
        assert_eq!(out.title, "Release notes");
        assert_eq!(out.text, "Release notes  \nline two");
    }

    #[test]
    fn long_first_line_is_cut_at_100_chars() {
        let line = "é".repeat(150);
        let out = extract_text(line.as_bytes());
        assert_eq!(out.title.chars().count(), 100);
        assert_eq!(out.text.chars().count(), 150);
    }

    #[test]
    fn empty_input_gets_fallback_title() {
        let out = extract_text(b"   \n\t");
        assert_eq!(out.title, FALLBACK_TITLE);
        assert_eq!(out.text, "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let out = extract_text(b"caf\xff ok");
        assert_eq!(out.text, "caf\u{fffd} ok");
    }
}
