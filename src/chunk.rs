//! Document-granular chunker.
//!
//! Each document becomes exactly one [`Chunk`]: its content cut to
//! [`MAX_CHUNK_CHARS`] code points. There is no semantic splitting; the
//! chunk carries a fixed similarity score of [`FIXED_SIMILARITY`].

use uuid::Uuid;

use crate::extract::truncate_chars;
use crate::models::{Chunk, Document};

/// Maximum chunk length in Unicode scalar values.
pub const MAX_CHUNK_CHARS: usize = 2048;

/// Score attached to every chunk; retrieval does no ranking.
pub const FIXED_SIMILARITY: f64 = 1.0;

/// Builds the single chunk for `document`. Truncation never splits a
/// multi-byte code point.
pub fn chunk_document(document: &Document) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        content: truncate_chars(&document.content, MAX_CHUNK_CHARS).to_string(),
        document_id: document.id.clone(),
        dataset_id: document.dataset_id.clone(),
        similarity: FIXED_SIMILARITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    fn doc(content: &str) -> Document {
        Document {
            id: "doc-1".to_string(),
            dataset_id: "kb-1".to_string(),
            name: "document_doc-1".to_string(),
            status: DocumentStatus::Completed,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_short_content_kept_whole() {
        let chunk = chunk_document(&doc("The quick brown fox"));
        assert_eq!(chunk.content, "The quick brown fox");
        assert_eq!(chunk.document_id, "doc-1");
        assert_eq!(chunk.dataset_id, "kb-1");
        assert_eq!(chunk.similarity, 1.0);
    }

    #[test]
    fn test_long_content_capped() {
        let chunk = chunk_document(&doc(&"a".repeat(5000)));
        assert_eq!(chunk.content.chars().count(), MAX_CHUNK_CHARS);
    }

    #[test]
    fn test_multibyte_boundary() {
        // 3-byte code points: a byte cut at 2048 would land mid-character.
        let text = "€".repeat(3000);
        let chunk = chunk_document(&doc(&text));
        assert_eq!(chunk.content.chars().count(), MAX_CHUNK_CHARS);
        assert!(chunk.content.chars().all(|c| c == '€'));
    }

    #[test]
    fn test_exact_cap_untouched() {
        let text = "é".repeat(MAX_CHUNK_CHARS);
        assert_eq!(chunk_document(&doc(&text)).content, text);
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(chunk_document(&doc("")).content, "");
    }

    #[test]
    fn test_ids_unique() {
        let d = doc("x");
        assert_ne!(chunk_document(&d).id, chunk_document(&d).id);
    }
}
