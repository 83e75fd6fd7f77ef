//! Keyword retrieval.
//!
//! A linear scan of the chunks of the requested datasets, matching the
//! question as a case-insensitive substring. No ranking, deduplication or
//! pagination is applied.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{Chunk, KnowledgeBase};

/// Retrieval response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub total: usize,
}

impl RetrievalResult {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let total = chunks.len();
        Self { chunks, total }
    }
}

/// Returns every chunk of `dataset_ids` whose content contains `question`,
/// ignoring case. Datasets are scanned in the order given, chunks in
/// insertion order. Unknown dataset ids contribute nothing; an empty
/// question matches every chunk.
pub fn retrieve(
    datasets: &IndexMap<String, KnowledgeBase>,
    dataset_ids: &[String],
    question: &str,
) -> Vec<Chunk> {
    let needle = question.to_lowercase();
    dataset_ids
        .iter()
        .filter_map(|id| datasets.get(id))
        .flat_map(|kb| kb.chunks.iter())
        .filter(|chunk| needle.is_empty() || chunk.content.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
