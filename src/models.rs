//! Core data models used throughout the knowledge-base service.
//!
//! These types represent the datasets, documents, and chunks that flow
//! through the ingestion and retrieval pipeline, plus the `{title, text}`
//! pair produced by every extractor.

use serde::{Deserialize, Serialize};

/// A knowledge base (dataset): the top-level container for documents and
/// the chunks derived from them.
///
/// A dataset exclusively owns its documents and chunks. It is never deleted
/// and is only ever mutated by appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl KnowledgeBase {
    /// Summary view without the nested documents and chunks.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at.clone(),
        }
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }
}

/// Dataset metadata as returned by the list/get/create endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

/// Ingestion state of a document.
///
/// Documents are currently marked [`DocumentStatus::Completed`] as soon as
/// they are created; the other states are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Completed,
    Failed,
}

/// One ingested source reduced to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Owning dataset. Fixed at creation.
    pub dataset_id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub content: String,
}

/// A retrievable unit of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub document_id: String,
    pub dataset_id: String,
    pub similarity: f64,
}

/// Output of an extractor: a display title plus the normalized body text.
///
/// The body is serialized as `markdown` to match the scrape wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub title: String,
    #[serde(rename = "markdown")]
    pub text: String,
}

impl Extracted {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}
