//! Port for small named records.

use async_trait::async_trait;

use crate::domain::errors::StoreResult;

/// Store for single serialized records addressed by a fixed name.
#[async_trait]
pub trait RecordStorePort: Send + Sync {
    /// Reads a record, `None` if absent.
    async fn get(&self, name: &str) -> StoreResult<Option<String>>;

    /// Writes a record, replacing any previous value.
    async fn set(&self, name: &str, value: &str) -> StoreResult<()>;

    /// Removes a record. Removing a missing record is not an error.
    async fn remove(&self, name: &str) -> StoreResult<()>;
}
