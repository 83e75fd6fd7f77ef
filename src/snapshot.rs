//! Snapshot persistence for the dataset store.
//!
//! The whole store is one JSON object keyed by dataset id, in creation
//! order. Writes go to `<path>.tmp` and are renamed over `<path>`, so a
//! crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::models::KnowledgeBase;

pub type Datasets = IndexMap<String, KnowledgeBase>;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the snapshot at `path`. A missing file is an empty store.
pub fn load(path: &Path) -> Result<Datasets, SnapshotError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Datasets::new()),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&raw).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Overwrites the snapshot at `path` with `datasets`, creating parent
/// directories as needed.
pub fn save(path: &Path, datasets: &Datasets) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec_pretty(datasets).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = tmp_path(path);
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Moves an unparseable snapshot to `<path>.corrupt`, replacing any earlier
/// one, and returns where it went.
pub fn set_aside(path: &Path) -> Result<PathBuf, SnapshotError> {
    let target = sibling(path, ".corrupt");
    fs::rename(path, &target).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target)
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Document, DocumentStatus};
    use tempfile::TempDir;

    fn sample() -> Datasets {
        let mut map = Datasets::new();
        for id in ["zeta", "alpha"] {
            map.insert(
                id.to_string(),
                KnowledgeBase {
                    id: id.to_string(),
                    name: format!("kb_{}", id),
                    description: "Auto-created knowledge base".to_string(),
                    created_at: "2026-01-01T00:00:00Z".to_string(),
                    documents: vec![Document {
                        id: format!("{}-doc", id),
                        dataset_id: id.to_string(),
                        name: "document_x".to_string(),
                        status: DocumentStatus::Completed,
                        content: "body".to_string(),
                    }],
                    chunks: vec![Chunk {
                        id: format!("{}-chunk", id),
                        content: "body".to_string(),
                        document_id: format!("{}-doc", id),
                        dataset_id: id.to_string(),
                        similarity: 1.0,
                    }],
                },
            );
        }
        map
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let loaded = load(&tmp.path().join("none.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/datasets.json");
        let data = sample();
        save(&path, &data).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, data);
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Json { .. })));
    }

    #[test]
    fn documents_and_chunks_default_when_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        fs::write(
            &path,
            r#"{"k":{"id":"k","name":"kb_k","description":"d","created_at":"t"}}"#,
        )
        .unwrap();
        let loaded = load(&path).unwrap();
        assert!(loaded["k"].documents.is_empty());
        assert!(loaded["k"].chunks.is_empty());
    }
}
