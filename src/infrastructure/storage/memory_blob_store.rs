//! In-memory blob store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::domain::errors::StoreResult;
use crate::domain::ports::BlobStorePort;

/// Blob store kept entirely in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    namespaces: RwLock<BTreeMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorePort for MemoryBlobStore {
    async fn put(&self, namespace: &str, key: &str, value: Bytes) -> StoreResult<()> {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let mut namespaces = self.namespaces.write();
        if let Some(records) = namespaces.get_mut(namespace) {
            records.remove(key);
            if records.is_empty() {
                namespaces.remove(namespace);
            }
        }
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        Ok(self.namespaces.read().keys().cloned().collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> StoreResult<()> {
        self.namespaces.write().remove(namespace);
        Ok(())
    }
}
