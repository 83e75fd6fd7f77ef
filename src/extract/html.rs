//! HTML to markdown-ish text.
//!
//! The normalizer is a fixed sequence of regex rewrites rather than a DOM
//! walk, so it tolerates arbitrarily broken markup:
//!
//! 1. drop comments and `<script>`, `<style>`, `<noscript>` blocks
//! 2. `<br>` → newline, `<p>` → blank line, `<h1>`..`<h6>` → `# ` heading,
//!    `<li>` → `- ` bullet
//! 3. strip every remaining tag
//! 4. decode entities
//! 5. collapse blank-line runs to one blank line and horizontal whitespace
//!    runs to one space, then trim
//! 6. cap the result at [`MAX_TEXT_CHARS`]

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{truncate_chars, MAX_TITLE_CHARS};
use crate::models::Extracted;

/// Hard ceiling on normalized text length, in characters.
pub const MAX_TEXT_CHARS: usize = 15_000;
/// Appended to text cut at [`MAX_TEXT_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n\n[content truncated...]";
/// Normalized text shorter than this is considered a failed parse.
pub const MIN_TEXT_CHARS: usize = 10;
/// Characters of raw payload kept when the parse fails.
pub const RAW_FALLBACK_CHARS: usize = 1_000;

pub const FALLBACK_TITLE: &str = "Web document";
pub const PARSE_FAILED_TITLE: &str = "Content parsing failed";

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static NOSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<noscript\b[^>]*>.*?</noscript\s*>").unwrap());

static BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\b[^>]*>").unwrap());
static P_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p\b[^>]*>").unwrap());
static P_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static H_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h[1-6]\b[^>]*>").unwrap());
static H_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</h[1-6]\s*>").unwrap());
static LI_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").unwrap());
static LI_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</li\s*>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());
static HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>").unwrap());

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap());

/// Extracts a title and normalized body from an HTML payload.
pub fn extract_html(bytes: &[u8]) -> Extracted {
    let raw = String::from_utf8_lossy(bytes);
    let title = extract_title(&raw).unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let text = normalize(&raw);

    if text.chars().count() < MIN_TEXT_CHARS {
        tracing::warn!(
            chars = text.chars().count(),
            "html normalized to almost nothing, keeping raw payload"
        );
        let head = truncate_chars(&raw, RAW_FALLBACK_CHARS);
        let body = if head.len() < raw.len() {
            format!("{}...", head)
        } else {
            head.to_string()
        };
        return Extracted::new(PARSE_FAILED_TITLE, body);
    }

    Extracted::new(title, text)
}

/// `<title>` content (whitespace collapsed), else the first `<h1>` (tags
/// stripped, first 100 characters).
pub fn extract_title(html: &str) -> Option<String> {
    let from_title = TITLE.captures(html).and_then(|caps| {
        let decoded = decode_entities(caps[1].trim());
        let collapsed = WHITESPACE.replace_all(&decoded, " ").trim().to_string();
        (!collapsed.is_empty()).then_some(collapsed)
    });
    if from_title.is_some() {
        return from_title;
    }

    H1.captures(html).and_then(|caps| {
        let stripped = ANY_TAG.replace_all(&caps[1], "");
        let decoded = decode_entities(stripped.trim());
        let title = truncate_chars(decoded.trim(), MAX_TITLE_CHARS).to_string();
        (!title.is_empty()).then_some(title)
    })
}

/// Runs the full normalization pipeline, including the length cap.
///
/// Re-running it on its own output yields the same output as long as the
/// output contains no literal markup or entity text.
pub fn normalize(html: &str) -> String {
    let s = COMMENT.replace_all(html, "");
    let s = SCRIPT.replace_all(&s, "");
    let s = STYLE.replace_all(&s, "");
    let s = NOSCRIPT.replace_all(&s, "");

    let s = BR.replace_all(&s, "\n");
    let s = P_OPEN.replace_all(&s, "\n\n");
    let s = P_CLOSE.replace_all(&s, "");
    let s = H_OPEN.replace_all(&s, "\n\n# ");
    let s = H_CLOSE.replace_all(&s, "\n");
    let s = LI_OPEN.replace_all(&s, "\n- ");
    let s = LI_CLOSE.replace_all(&s, "");

    let s = ANY_TAG.replace_all(&s, "");
    let s = decode_entities(&s);

    let s = BLANK_LINES.replace_all(&s, "\n\n");
    let s = HSPACE.replace_all(&s, " ");
    let text = s.trim();

    if text.chars().count() > MAX_TEXT_CHARS {
        let mut cut = truncate_chars(text, MAX_TEXT_CHARS).to_string();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        text.to_string()
    }
}

/// Decodes named (HTML5) and numeric character references. Unknown or
/// invalid references are left as-is.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    ENTITY.replace_all(s, |caps: &Captures| {
        let name = &caps[1];
        let resolved = match name.strip_prefix('#') {
            Some(num) => {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32).map(String::from)
            }
            None => quick_xml::escape::resolve_html5_entity(name).map(str::to_string),
        };
        resolved.unwrap_or_else(|| caps[0].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>
    Release   Notes &amp; Changes
  </title>
  <style>body { color: red; }</style>
  <script type="text/javascript">var hidden = "secret";</script>
</head>
<body>
  <noscript>Enable JavaScript</noscript>
  <!-- build 42 -->
  <h1>Version <em>2.0</em></h1>
  <p>The   quick&nbsp;brown fox &lt;jumps&gt;.</p>
  <ul>
    <li>First item</li>
    <li>Second item</li>
  </ul>
  Line one<br/>Line two
</body>
</html>"#;

    #[test]
    fn title_prefers_title_tag() {
        assert_eq!(
            extract_title(PAGE).as_deref(),
            Some("Release Notes & Changes")
        );
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1 class=\"x\">Hello <b>World</b> &amp; more</h1></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Hello World & more"));
    }

    #[test]
    fn h1_title_is_capped() {
        let html = format!("<h1>{}</h1>", "a".repeat(300));
        assert_eq!(extract_title(&html).unwrap().len(), 100);
    }

    #[test]
    fn no_title_sources() {
        assert_eq!(extract_title("<p>just a paragraph</p>"), None);
        let out = extract_html(b"<p>just a paragraph of text</p>");
        assert_eq!(out.title, FALLBACK_TITLE);
    }

    #[test]
    fn normalize_strips_hidden_blocks() {
        let text = normalize(PAGE);
        assert!(!text.contains("secret"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Enable JavaScript"));
        assert!(!text.contains("build 42"));
        assert!(!text.contains("<em>"));
    }

    #[test]
    fn normalize_emits_markdown_markers() {
        let text = normalize(PAGE);
        assert!(text.contains("# Version 2.0"), "got: {}", text);
        assert!(text.contains("\n- First item"));
        assert!(text.contains("\n- Second item"));
        assert!(text.contains("Line one\nLine two"));
        assert!(text.contains("The quick\u{a0}brown fox <jumps>."));
    }

    #[test]
    fn normalize_collapses_blank_lines() {
        let text = normalize("<h1>Title</h1><p>Body text here</p>");
        assert_eq!(text, "# Title\n\nBody text here");
        assert!(!normalize(PAGE).contains("\n\n\n"));
    }

    #[test]
    fn normalize_lists() {
        assert_eq!(
            normalize("<ul><li>One</li><li>Two</li></ul>"),
            "- One\n- Two"
        );
    }

    #[test]
    fn paragraph_rule_does_not_touch_similar_tags() {
        let text = normalize("<pre>code</pre><link rel=\"x\"><param>v</param>");
        assert_eq!(text, "codev");
    }

    #[test]
    fn normalize_is_idempotent_on_clean_output() {
        let once = normalize("<h2>Heading</h2>\n\n\n<p>Alpha   beta</p><p>Gamma</p><ul><li>x</li></ul>");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let html = format!("<p>{}</p>", "word ".repeat(5_000));
        let text = normalize(&html);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            text.chars().count(),
            MAX_TEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
        assert_eq!(normalize(&text), text);
    }

    #[test]
    fn short_output_falls_back_to_raw() {
        let raw = "<div><img src=\"a.png\"></div>";
        let out = extract_html(raw.as_bytes());
        assert_eq!(out.title, PARSE_FAILED_TITLE);
        assert_eq!(out.text, raw);
    }

    #[test]
    fn raw_fallback_is_capped() {
        let raw = format!("<div>{}</div>", "<br>".repeat(600));
        let out = extract_html(raw.as_bytes());
        assert_eq!(out.title, PARSE_FAILED_TITLE);
        assert!(out.text.ends_with("..."));
        assert_eq!(out.text.chars().count(), RAW_FALLBACK_CHARS + 3);
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_entities("&copy; 2024"), "\u{a9} 2024");
        assert_eq!(decode_entities("&bogus; & &#xFFFFFF;"), "&bogus; & &#xFFFFFF;");
    }
}
