//! Format classification.
//!
//! Maps a declared media type and/or a source name (URL or filename) to a
//! [`DocumentFormat`]. Classification is driven purely by these hints; the
//! payload bytes are never sniffed, so a mislabeled resource is extracted
//! with the wrong extractor rather than rejected.

use std::fmt;

pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_HTML: &str = "text/html";
pub const MIME_XHTML: &str = "application/xhtml+xml";

/// The formats the extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    WordDoc,
    Pdf,
    Spreadsheet,
    PlainText,
    Html,
    Unrecognized,
}

impl DocumentFormat {
    /// Matches a `Content-Type` value. Parameters (`; charset=...`) and case
    /// are ignored.
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            MIME_DOCX => DocumentFormat::WordDoc,
            MIME_PDF => DocumentFormat::Pdf,
            MIME_XLSX => DocumentFormat::Spreadsheet,
            MIME_HTML | MIME_XHTML => DocumentFormat::Html,
            s if s.starts_with("text/") => DocumentFormat::PlainText,
            _ => DocumentFormat::Unrecognized,
        }
    }

    /// Matches the suffix of a filename or URL path. Query strings and
    /// fragments are ignored.
    pub fn from_source_name(source: &str) -> Self {
        let path = source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if path.ends_with(".docx") {
            DocumentFormat::WordDoc
        } else if path.ends_with(".pdf") {
            DocumentFormat::Pdf
        } else if path.ends_with(".xlsx") {
            DocumentFormat::Spreadsheet
        } else if path.ends_with(".txt") || path.ends_with(".md") || path.ends_with(".csv") {
            DocumentFormat::PlainText
        } else if path.ends_with(".html") || path.ends_with(".htm") {
            DocumentFormat::Html
        } else {
            DocumentFormat::Unrecognized
        }
    }

    /// Human-readable label used in log lines and placeholder titles.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::WordDoc => "Word",
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Spreadsheet => "Spreadsheet",
            DocumentFormat::PlainText => "Text",
            DocumentFormat::Html => "HTML",
            DocumentFormat::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies a payload from its hints.
///
/// The declared media type wins; the source name suffix is consulted only
/// when the media type is absent or unknown. Anything still unrecognized is
/// treated as generic web content.
pub fn classify(media_type: Option<&str>, source: Option<&str>) -> DocumentFormat {
    let by_media = media_type
        .map(DocumentFormat::from_media_type)
        .unwrap_or(DocumentFormat::Unrecognized);
    if by_media != DocumentFormat::Unrecognized {
        return by_media;
    }

    let by_name = source
        .map(DocumentFormat::from_source_name)
        .unwrap_or(DocumentFormat::Unrecognized);
    if by_name != DocumentFormat::Unrecognized {
        return by_name;
    }

    DocumentFormat::Html
}
