//! Dataset store.
//!
//! [`KnowledgeBaseStore`] owns every dataset with its documents and chunks.
//! Each mutation runs under one lock together with the snapshot write that
//! follows it, so concurrent writers can never interleave snapshots. A
//! failed write is logged and the in-memory state stays authoritative.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::chunk::chunk_document;
use crate::models::{Chunk, DatasetSummary, Document, DocumentStatus, KnowledgeBase};
use crate::multipart;
use crate::search::{self, RetrievalResult};
use crate::snapshot::{self, Datasets, SnapshotError};

pub const DEFAULT_DESCRIPTION: &str = "Auto-created knowledge base";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

/// Optional overrides for a new dataset. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewDataset {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Exact-match filters for [`KnowledgeBaseStore::list_datasets`]. Absent or
/// empty filters pass everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatasetFilter {
    pub name: Option<String>,
    pub id: Option<String>,
}

impl DatasetFilter {
    fn matches(&self, kb: &KnowledgeBase) -> bool {
        let pass = |filter: &Option<String>, value: &str| match filter.as_deref() {
            Some(f) if !f.is_empty() => f == value,
            _ => true,
        };
        pass(&self.name, &kb.name) && pass(&self.id, &kb.id)
    }
}

pub struct KnowledgeBaseStore {
    datasets: Mutex<Datasets>,
    snapshot_path: Option<PathBuf>,
}

impl KnowledgeBaseStore {
    /// A store with no backing file. Used by tests and one-shot commands.
    pub fn in_memory() -> Self {
        Self {
            datasets: Mutex::new(Datasets::new()),
            snapshot_path: None,
        }
    }

    /// Opens the store persisted at `path`. A missing file starts empty; an
    /// unreadable one is logged and also starts empty. A corrupt one is moved
    /// to `<path>.corrupt` first so later writes don't destroy it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let datasets = match snapshot::load(&path) {
            Ok(datasets) => {
                tracing::info!(
                    path = %path.display(),
                    datasets = datasets.len(),
                    "loaded dataset snapshot"
                );
                datasets
            }
            Err(e @ SnapshotError::Json { .. }) => {
                match snapshot::set_aside(&path) {
                    Ok(moved) => tracing::warn!(
                        error = %e,
                        moved_to = %moved.display(),
                        "corrupt snapshot set aside, starting empty"
                    ),
                    Err(rename) => tracing::warn!(
                        error = %e,
                        rename_error = %rename,
                        "corrupt snapshot could not be set aside, starting empty"
                    ),
                }
                Datasets::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load snapshot, starting empty");
                Datasets::new()
            }
        };
        Self {
            datasets: Mutex::new(datasets),
            snapshot_path: Some(path),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Datasets> {
        self.datasets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the full snapshot. Called with the lock held.
    fn persist(&self, datasets: &Datasets) {
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = snapshot::save(path, datasets) {
                tracing::warn!(error = %e, "snapshot write failed; keeping in-memory state");
            }
        }
    }

    pub fn create_dataset(&self, params: NewDataset) -> KnowledgeBase {
        let id = Uuid::new_v4().to_string();
        let name = non_blank(params.name).unwrap_or_else(|| format!("kb_{}", &id[..8]));
        let description =
            non_blank(params.description).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        let kb = KnowledgeBase {
            id: id.clone(),
            name,
            description,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            documents: Vec::new(),
            chunks: Vec::new(),
        };

        let mut datasets = self.lock();
        datasets.insert(id, kb.clone());
        self.persist(&datasets);
        tracing::info!(id = %kb.id, name = %kb.name, "created dataset");
        kb
    }

    /// Summaries matching `filter`, in creation order, at most `page_size`.
    pub fn list_datasets(&self, filter: &DatasetFilter, page_size: usize) -> Vec<DatasetSummary> {
        self.lock()
            .values()
            .filter(|kb| filter.matches(kb))
            .take(page_size)
            .map(KnowledgeBase::summary)
            .collect()
    }

    pub fn get_dataset(&self, id: &str) -> Result<KnowledgeBase, StoreError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DatasetNotFound(id.to_string()))
    }

    /// Stores an uploaded multipart body as a new completed document. The
    /// store is left untouched when the dataset does not exist.
    pub fn create_document(
        &self,
        dataset_id: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<Document, StoreError> {
        let mut datasets = self.lock();
        let kb = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| StoreError::DatasetNotFound(dataset_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let document = Document {
            name: format!("document_{}", &id[..8]),
            id,
            dataset_id: dataset_id.to_string(),
            status: DocumentStatus::Completed,
            content: multipart::upload_content(body, content_type),
        };
        kb.documents.push(document.clone());
        self.persist(&datasets);

        tracing::info!(
            dataset = dataset_id,
            document = %document.id,
            chars = document.content.chars().count(),
            "created document"
        );
        Ok(document)
    }

    pub fn list_documents(&self, dataset_id: &str) -> Result<Vec<Document>, StoreError> {
        self.lock()
            .get(dataset_id)
            .map(|kb| kb.documents.clone())
            .ok_or_else(|| StoreError::DatasetNotFound(dataset_id.to_string()))
    }

    pub fn get_document(&self, dataset_id: &str, document_id: &str) -> Result<Document, StoreError> {
        let datasets = self.lock();
        let kb = datasets
            .get(dataset_id)
            .ok_or_else(|| StoreError::DatasetNotFound(dataset_id.to_string()))?;
        kb.document(document_id)
            .cloned()
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_string()))
    }

    /// Appends one chunk per referenced document. Unknown document ids are
    /// skipped. Returns the appended chunks.
    pub fn append_chunks(
        &self,
        dataset_id: &str,
        document_ids: &[String],
    ) -> Result<Vec<Chunk>, StoreError> {
        let mut datasets = self.lock();
        let kb = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| StoreError::DatasetNotFound(dataset_id.to_string()))?;

        let appended: Vec<Chunk> = document_ids
            .iter()
            .filter_map(|doc_id| {
                let doc = kb.document(doc_id);
                if doc.is_none() {
                    tracing::debug!(dataset = dataset_id, document = %doc_id, "skipping unknown document");
                }
                doc.map(chunk_document)
            })
            .collect();
        kb.chunks.extend(appended.iter().cloned());
        self.persist(&datasets);

        tracing::info!(dataset = dataset_id, chunks = appended.len(), "appended chunks");
        Ok(appended)
    }

    pub fn retrieve(&self, dataset_ids: &[String], question: &str) -> RetrievalResult {
        let chunks = search::retrieve(&self.lock(), dataset_ids, question);
        tracing::info!(
            datasets = dataset_ids.len(),
            question,
            hits = chunks.len(),
            "retrieval"
        );
        RetrievalResult::new(chunks)
    }

    /// Deep copy of every dataset, in creation order.
    pub fn snapshot(&self) -> Datasets {
        self.lock().clone()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CT: &str = "multipart/form-data; boundary=b0undary";

    fn upload(text: &str) -> Vec<u8> {
        format!(
            "--b0undary\r\nContent-Disposition: form-data; name=\"file\"; filename=\"f.txt\"\r\n\r\n{}\r\n--b0undary--\r\n",
            text
        )
        .into_bytes()
    }

    #[test]
    fn create_dataset_derives_name_and_description() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        assert_eq!(kb.name, format!("kb_{}", &kb.id[..8]));
        assert_eq!(kb.description, DEFAULT_DESCRIPTION);
        assert!(chrono::DateTime::parse_from_rfc3339(&kb.created_at).is_ok());
        assert!(kb.documents.is_empty() && kb.chunks.is_empty());
    }

    #[test]
    fn create_dataset_overrides() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset {
            name: Some("manuals".into()),
            description: Some("  ".into()),
        });
        assert_eq!(kb.name, "manuals");
        assert_eq!(kb.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn list_filters_are_exact() {
        let store = KnowledgeBaseStore::in_memory();
        let a = store.create_dataset(NewDataset {
            name: Some("alpha".into()),
            ..Default::default()
        });
        let b = store.create_dataset(NewDataset {
            name: Some("alphabet".into()),
            ..Default::default()
        });

        let all = store.list_datasets(&DatasetFilter::default(), 100);
        assert_eq!(all.iter().map(|s| &s.id).collect::<Vec<_>>(), vec![&a.id, &b.id]);

        let by_name = DatasetFilter {
            name: Some("alpha".into()),
            id: None,
        };
        assert_eq!(store.list_datasets(&by_name, 100), vec![a.summary()]);

        let mismatched = DatasetFilter {
            name: Some("alpha".into()),
            id: Some(b.id.clone()),
        };
        assert!(store.list_datasets(&mismatched, 100).is_empty());

        let empty = DatasetFilter {
            name: Some(String::new()),
            id: Some(String::new()),
        };
        assert_eq!(store.list_datasets(&empty, 100).len(), 2);
        assert_eq!(store.list_datasets(&empty, 1), vec![a.summary()]);
    }

    #[test]
    fn new_dataset_listed_exactly_once() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        let listed = store.list_datasets(&DatasetFilter::default(), 100);
        assert_eq!(listed.iter().filter(|s| s.id == kb.id).count(), 1);
    }

    #[test]
    fn get_missing_dataset() {
        let store = KnowledgeBaseStore::in_memory();
        assert_eq!(
            store.get_dataset("nope"),
            Err(StoreError::DatasetNotFound("nope".into()))
        );
    }

    #[test]
    fn create_document_stores_upload() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        let doc = store
            .create_document(&kb.id, &upload("hello there"), Some(CT))
            .unwrap();
        assert_eq!(doc.content, "hello there");
        assert_eq!(doc.dataset_id, kb.id);
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.name, format!("document_{}", &doc.id[..8]));
        assert_eq!(store.list_documents(&kb.id).unwrap(), vec![doc.clone()]);
        assert_eq!(store.get_document(&kb.id, &doc.id).unwrap(), doc);
        assert_eq!(
            store.get_document(&kb.id, "missing"),
            Err(StoreError::DocumentNotFound("missing".into()))
        );
    }

    #[test]
    fn create_document_without_part_uses_placeholder() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        let doc = store.create_document(&kb.id, b"", None).unwrap();
        assert_eq!(doc.content, multipart::PLACEHOLDER_CONTENT);
    }

    #[test]
    fn upload_to_missing_dataset_does_not_mutate() {
        let store = KnowledgeBaseStore::in_memory();
        store.create_dataset(NewDataset::default());
        let before = store.snapshot();
        let err = store
            .create_document("missing", &upload("x"), Some(CT))
            .unwrap_err();
        assert_eq!(err, StoreError::DatasetNotFound("missing".into()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn append_chunks_skips_unknown_documents() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        let doc = store
            .create_document(&kb.id, &upload("The quick brown fox"), Some(CT))
            .unwrap();
        let appended = store
            .append_chunks(&kb.id, &[doc.id.clone(), "ghost".to_string()])
            .unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].document_id, doc.id);
        assert_eq!(appended[0].dataset_id, kb.id);
        assert_eq!(store.get_dataset(&kb.id).unwrap().chunks, appended);

        assert!(matches!(
            store.append_chunks("missing", &[doc.id]),
            Err(StoreError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn end_to_end_retrieval() {
        let store = KnowledgeBaseStore::in_memory();
        let kb = store.create_dataset(NewDataset::default());
        let doc = store
            .create_document(&kb.id, &upload("The quick brown fox"), Some(CT))
            .unwrap();
        store.append_chunks(&kb.id, &[doc.id]).unwrap();

        let result = store.retrieve(&[kb.id.clone()], "quick");
        assert_eq!(result.total, 1);
        assert_eq!(result.chunks[0].content, "The quick brown fox");
        assert_eq!(store.retrieve(&[kb.id], "slow").total, 0);
    }

    #[test]
    fn reopen_restores_identical_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/datasets.json");

        let store = KnowledgeBaseStore::open(&path);
        let first = store.create_dataset(NewDataset::default());
        store.create_dataset(NewDataset::default());
        let doc = store
            .create_document(&first.id, &upload("persist me"), Some(CT))
            .unwrap();
        store.append_chunks(&first.id, &[doc.id]).unwrap();
        let before = store.snapshot();
        drop(store);

        let reopened = KnowledgeBaseStore::open(&path);
        assert_eq!(reopened.snapshot(), before);
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = KnowledgeBaseStore::open(&path);
        assert!(store.snapshot().is_empty());

        let kept = tmp.path().join("datasets.json.corrupt");
        assert_eq!(std::fs::read_to_string(&kept).unwrap(), "garbage");

        store.create_dataset(NewDataset::default());
        assert_eq!(KnowledgeBaseStore::open(&path).snapshot().len(), 1);
        assert_eq!(std::fs::read_to_string(&kept).unwrap(), "garbage");
    }

    #[test]
    fn unwritable_snapshot_keeps_memory_state() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail.
        let path = tmp.path().join("datasets.json");
        std::fs::create_dir(&path).unwrap();
        let store = KnowledgeBaseStore::open(&path);
        let kb = store.create_dataset(NewDataset::default());
        assert!(store.get_dataset(&kb.id).is_ok());
    }
}
