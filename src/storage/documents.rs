//! File-per-document store
//!
//! Owns `items/`. Knows nothing about fields or caches.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::files::{self, FileLocks};
use super::layout::IndexLayout;
use crate::index::{IndexError, IndexResult};

/// Reads and writes one JSON file per document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    layout: IndexLayout,
    locks: Arc<FileLocks>,
}

impl DocumentStore {
    pub fn new(layout: IndexLayout, locks: Arc<FileLocks>) -> Self {
        Self { layout, locks }
    }

    pub fn path(&self, id: &str) -> PathBuf {
        self.layout.document_path(id)
    }

    /// Checks the filesystem without reading or parsing the file
    pub async fn exists(&self, id: &str) -> bool {
        files::exists(&self.path(id)).await
    }

    /// Reads and deserializes a document
    pub async fn read<T: DeserializeOwned>(&self, id: &str) -> IndexResult<Option<T>> {
        files::read_json(&self.path(id)).await
    }

    /// Size of the stored document in bytes
    pub async fn size_of(&self, id: &str) -> Option<u64> {
        files::file_size(&self.path(id)).await
    }

    /// Writes a document, returning its size in bytes
    pub async fn write<T: Serialize>(&self, id: &str, document: &T) -> IndexResult<u64> {
        let path = self.path(id);
        let _guard = self.locks.lock(&path).await;
        files::write_json(&path, document).await
    }

    /// Deletes a document. Returns false if it was already gone.
    pub async fn delete(&self, id: &str) -> IndexResult<bool> {
        let path = self.path(id);
        let _guard = self.locks.lock(&path).await;
        files::remove_if_exists(&path).await
    }

    /// All stored document IDs, sorted
    pub async fn list_ids(&self) -> IndexResult<Vec<String>> {
        let paths = files::list_files(&self.layout.items_dir()).await?;
        let mut ids: Vec<String> = paths
            .iter()
            .filter_map(|p| IndexLayout::document_id_from_path(p))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Counts documents and their total size by scanning `items/`
    pub async fn scan_totals(&self) -> IndexResult<(u64, u64)> {
        let paths = files::list_files(&self.layout.items_dir()).await?;
        let mut count = 0u64;
        let mut bytes = 0u64;
        for path in paths {
            if IndexLayout::document_id_from_path(&path).is_some() {
                count += 1;
                bytes += files::file_size(&path).await.unwrap_or(0);
            }
        }
        Ok((count, bytes))
    }

    /// Deletes every document
    pub async fn clear(&self) -> IndexResult<()> {
        files::remove_dir_if_exists(&self.layout.items_dir()).await?;
        Ok(())
    }
}

/// Rejects IDs that cannot identify a document.
pub fn validate_document_id(id: &str) -> IndexResult<()> {
    if id.trim().is_empty() {
        return Err(IndexError::validation("document id must not be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;

    fn store(root: &Path) -> DocumentStore {
        DocumentStore::new(IndexLayout::new(root, "props"), Arc::new(FileLocks::new()))
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());

        assert!(!store.exists("p1").await);
        let size = store.write("p1", &json!({"city": "Aden"})).await.unwrap();
        assert!(size > 0);
        assert!(store.exists("p1").await);
        assert_eq!(store.size_of("p1").await, Some(size));

        let doc: Option<Value> = store.read("p1").await.unwrap();
        assert_eq!(doc, Some(json!({"city": "Aden"})));

        assert!(store.delete("p1").await.unwrap());
        assert!(!store.delete("p1").await.unwrap());
        assert!(!store.exists("p1").await);
    }

    #[tokio::test]
    async fn test_list_ids_sorted_and_decoded() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());

        for id in ["p3", "a/b", "p1"] {
            store.write(id, &json!({})).await.unwrap();
        }

        assert_eq!(store.list_ids().await.unwrap(), vec!["a/b", "p1", "p3"]);
        let (count, bytes) = store.scan_totals().await.unwrap();
        assert_eq!(count, 3);
        assert!(bytes > 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store.write("p1", &json!({})).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[test]
    fn test_validate_document_id() {
        assert!(validate_document_id("p1").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("   ").is_err());
    }
}
