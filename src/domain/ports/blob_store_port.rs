//! Port for namespaced binary storage.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::StoreResult;

/// Namespaced key/value store for binary payloads.
///
/// Implementations must be thread-safe. Deleting a missing key or namespace
/// is not an error.
#[async_trait]
pub trait BlobStorePort: Send + Sync {
    /// Writes a record, replacing any previous value atomically.
    async fn put(&self, namespace: &str, key: &str, value: Bytes) -> StoreResult<()>;

    /// Reads a record, `None` if absent.
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<Bytes>>;

    /// Deletes a record.
    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()>;

    /// Lists record keys in a namespace.
    async fn list_keys(&self, namespace: &str) -> StoreResult<Vec<String>>;

    /// Lists namespaces that currently hold records.
    async fn list_namespaces(&self) -> StoreResult<Vec<String>>;

    /// Deletes a namespace and everything in it.
    async fn delete_namespace(&self, namespace: &str) -> StoreResult<()>;
}
