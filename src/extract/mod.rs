//! Multi-format text extraction.
//!
//! Every format has an [`Extractor`] turning raw bytes into an
//! [`Extracted`] `{title, text}` pair. Extraction never fails from the
//! caller's point of view: internal errors are converted into a placeholder
//! title plus a readable error message in the body, so a malformed upload
//! or page degrades to a stub document instead of aborting the request.
//!
//! | Format | Extractor | Backing |
//! |--------|-----------|---------|
//! | Word (`.docx`) | [`WordExtractor`] | `zip` + `quick-xml` (feature `office`) |
//! | PDF | [`PdfExtractor`] | `lopdf` (feature `pdf`) |
//! | Spreadsheet (`.xlsx`) | [`SpreadsheetExtractor`] | `zip` + `quick-xml` (feature `office`) |
//! | Plain text | [`PlainTextExtractor`] | lossy UTF-8 |
//! | HTML | [`HtmlExtractor`] | [`html`] normalizer |
//!
//! When a format's cargo feature is disabled its extractor still exists and
//! returns a fixed "extraction unavailable" result.

pub mod html;
#[cfg(feature = "office")]
mod ooxml;
#[cfg(feature = "pdf")]
mod pdf;
pub mod text;

use crate::classify::DocumentFormat;
use crate::models::Extracted;

/// Longest title taken from the first line or paragraph of a document.
pub const MAX_TITLE_CHARS: usize = 100;

/// Internal extraction failure. Never leaves this module tree.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid archive: {0}")]
    Zip(String),
    #[error("invalid XML: {0}")]
    Xml(String),
    #[error("{0}")]
    Pdf(String),
    #[error("missing part: {0}")]
    MissingPart(String),
    #[error("part {0} exceeds size limit")]
    TooLarge(String),
}

/// Common contract for all format extractors.
pub trait Extractor: Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// Extracts a title and body. Never panics on malformed input.
    fn extract(&self, bytes: &[u8]) -> Extracted;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WordExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for WordExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::WordDoc
    }

    #[cfg(feature = "office")]
    fn extract(&self, bytes: &[u8]) -> Extracted {
        ooxml::extract_docx(bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "word extraction failed");
            Extracted::new(
                "Word document parsing error",
                format!("Failed to parse Word document: {}", e),
            )
        })
    }

    #[cfg(not(feature = "office"))]
    fn extract(&self, _bytes: &[u8]) -> Extracted {
        unavailable(self.format(), "office")
    }
}

impl Extractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    #[cfg(feature = "pdf")]
    fn extract(&self, bytes: &[u8]) -> Extracted {
        pdf::extract_pdf(bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "pdf extraction failed");
            Extracted::new("PDF parsing error", format!("Failed to parse PDF: {}", e))
        })
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, _bytes: &[u8]) -> Extracted {
        unavailable(self.format(), "pdf")
    }
}

impl Extractor for SpreadsheetExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    #[cfg(feature = "office")]
    fn extract(&self, bytes: &[u8]) -> Extracted {
        ooxml::extract_xlsx(bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "spreadsheet extraction failed");
            Extracted::new(
                "Spreadsheet parsing error",
                format!("Failed to parse spreadsheet: {}", e),
            )
        })
    }

    #[cfg(not(feature = "office"))]
    fn extract(&self, _bytes: &[u8]) -> Extracted {
        unavailable(self.format(), "office")
    }
}

impl Extractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Extracted {
        text::extract_text(bytes)
    }
}

impl Extractor for HtmlExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    fn extract(&self, bytes: &[u8]) -> Extracted {
        html::extract_html(bytes)
    }
}

/// Returns the extractor registered for `format`. Unrecognized content is
/// handled as generic web content.
pub fn extractor_for(format: DocumentFormat) -> &'static dyn Extractor {
    match format {
        DocumentFormat::WordDoc => &WordExtractor,
        DocumentFormat::Pdf => &PdfExtractor,
        DocumentFormat::Spreadsheet => &SpreadsheetExtractor,
        DocumentFormat::PlainText => &PlainTextExtractor,
        DocumentFormat::Html | DocumentFormat::Unrecognized => &HtmlExtractor,
    }
}

/// Extracts `bytes` with the extractor for `format`.
pub fn extract(format: DocumentFormat, bytes: &[u8]) -> Extracted {
    let extractor = extractor_for(format);
    tracing::debug!(format = %extractor.format(), bytes = bytes.len(), "extracting");
    extractor.extract(bytes)
}

/// Fixed result for a format whose backing feature was compiled out.
#[allow(dead_code)]
fn unavailable(format: DocumentFormat, feature: &str) -> Extracted {
    Extracted::new(
        format!("{} extraction unavailable", format.label()),
        format!(
            "{} extraction is not available in this build (enable the `{}` feature)",
            format.label(),
            feature
        ),
    )
}

/// First `max` characters of `s`, never splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
