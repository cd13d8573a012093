//! Filesystem-backed blob store.
//!
//! Each namespace is a directory under the root and each record a file in it.
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so readers never see a half-written record.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, trace};

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::BlobStorePort;

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> StoreResult<PathBuf> {
        validate_segment(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn record_path(&self, namespace: &str, key: &str) -> StoreResult<PathBuf> {
        validate_segment(key)?;
        Ok(self.namespace_dir(namespace)?.join(key))
    }
}

#[async_trait]
impl BlobStorePort for FsBlobStore {
    async fn put(&self, namespace: &str, key: &str, value: Bytes) -> StoreResult<()> {
        let dir = self.namespace_dir(namespace)?;
        let path = self.record_path(namespace, key)?;

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            std::fs::create_dir_all(&dir)?;
            let mut temp_file = tempfile::NamedTempFile::new_in(&dir)?;
            temp_file.write_all(&value)?;
            temp_file.as_file().sync_all()?;
            temp_file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::io(format!("write task failed: {e}")))??;

        trace!(namespace, key, "Stored blob");
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Bytes>> {
        let path = self.record_path(namespace, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let path = self.record_path(namespace, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, namespace: &str) -> StoreResult<Vec<String>> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_segment(name).is_ok()
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut namespaces = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_segment(name).is_ok()
            {
                namespaces.push(name.to_string());
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }

    async fn delete_namespace(&self, namespace: &str) -> StoreResult<()> {
        let dir = self.namespace_dir(namespace)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(path = %dir.display(), "Removed blob namespace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Accepts non-empty names made of `[A-Za-z0-9._-]` that do not start with a dot.
fn validate_segment(segment: &str) -> StoreResult<()> {
    let valid = !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_key(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn create_test_store() -> (FsBlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("results"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp) = create_test_store();

        store
            .put("results-v1", "abc.blob", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        let value = store.get("results-v1", "abc.blob").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"payload")));
    }

    #[tokio::test]
    async fn test_missing_records_are_none() {
        let (store, _temp) = create_test_store();

        assert_eq!(store.get("results-v1", "nope.blob").await.unwrap(), None);
        assert!(store.list_keys("results-v1").await.unwrap().is_empty());
        assert!(store.list_namespaces().await.unwrap().is_empty());
        assert_ok!(store.delete("results-v1", "nope.blob").await);
        assert_ok!(store.delete_namespace("results-v1").await);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (store, _temp) = create_test_store();

        store
            .put("ns", "k", Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .put("ns", "k", Bytes::from_static(b"second"))
            .await
            .unwrap();

        assert_eq!(
            store.get("ns", "k").await.unwrap(),
            Some(Bytes::from_static(b"second"))
        );
        assert_eq!(store.list_keys("ns").await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_namespaces_are_listed_and_removed() {
        let (store, _temp) = create_test_store();

        store.put("results-v0", "a", Bytes::new()).await.unwrap();
        store.put("results-v1", "b", Bytes::new()).await.unwrap();
        assert_eq!(
            store.list_namespaces().await.unwrap(),
            vec!["results-v0".to_string(), "results-v1".to_string()]
        );

        store.delete_namespace("results-v0").await.unwrap();
        assert_eq!(
            store.list_namespaces().await.unwrap(),
            vec!["results-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (store, _temp) = create_test_store();

        store.put("ns", "only", Bytes::new()).await.unwrap();
        store.delete("ns", "only").await.unwrap();

        assert_eq!(store.get("ns", "only").await.unwrap(), None);
        assert!(store.list_keys("ns").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (store, _temp) = create_test_store();

        assert_err!(store.put("..", "x", Bytes::new()).await);
        assert_err!(store.put("ns", "../x", Bytes::new()).await);
        assert_err!(store.get("ns", "").await);
        assert_err!(store.list_keys("a/b").await);
    }
}
