//! PDF extraction, page by page.

use lopdf::Document;

use super::ExtractError;
use crate::models::Extracted;

const EMPTY_TEXT: &str = "No content could be extracted from the PDF";

/// Extracts every page under a `--- page N ---` marker. A page that fails
/// to decode contributes an error line instead of failing the document;
/// pages with no text are skipped.
pub fn extract_pdf(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let pages = doc.get_pages();
    let title = format!("PDF document ({} pages)", pages.len());

    let mut blocks = Vec::new();
    for &page_number in pages.keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    blocks.push(format!("--- page {} ---\n{}", page_number, text));
                }
            }
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "pdf page extraction failed");
                blocks.push(format!(
                    "--- page {} ---\nCould not extract page content: {}",
                    page_number, e
                ));
            }
        }
    }

    let text = if blocks.is_empty() {
        EMPTY_TEXT.to_string()
    } else {
        blocks.join("\n\n")
    };
    Ok(Extracted::new(title, text))
}
