//! Filesystem-backed record store, one JSON file per record.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::RecordStorePort;

/// Stores records as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    /// Creates a store in `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the directory records are kept in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> StoreResult<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        if !valid {
            return Err(StoreError::invalid_key(name));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

#[async_trait]
impl RecordStorePort for FsRecordStore {
    async fn get(&self, name: &str) -> StoreResult<Option<String>> {
        let path = self.record_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, name: &str, value: &str) -> StoreResult<()> {
        let path = self.record_path(name)?;
        let dir = self.dir.clone();
        let content = value.to_string();

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            std::fs::create_dir_all(&dir)?;
            let mut temp_file = tempfile::NamedTempFile::new_in(&dir)?;
            temp_file.write_all(content.as_bytes())?;
            temp_file.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::io(format!("write task failed: {e}")))?
    }

    async fn remove(&self, name: &str) -> StoreResult<()> {
        let path = self.record_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
