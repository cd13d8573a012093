//! Writes exported results into an output directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::entities::ProcessedResult;
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::ExportTargetPort;

/// Saves each result as `<output_dir>/<derived filename>`.
#[derive(Debug, Clone)]
pub struct FsExportTarget {
    output_dir: PathBuf,
}

impl FsExportTarget {
    /// Creates a target writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ExportTargetPort for FsExportTarget {
    async fn deliver(&self, result: &ProcessedResult) -> StoreResult<String> {
        let file_name = Path::new(&result.derived_filename)
            .file_name()
            .filter(|name| *name == result.derived_filename.as_str())
            .ok_or_else(|| StoreError::invalid_key(&result.derived_filename))?;

        fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(file_name);

        let mut file = fs::File::create(&path).await?;
        file.write_all(&result.bytes).await?;
        file.flush().await?;

        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn result(name: &str) -> ProcessedResult {
        ProcessedResult {
            source_name: "in.png".to_string(),
            derived_filename: name.to_string(),
            bytes: Bytes::from_static(b"jpeg bytes"),
            original_size: 20,
            attempts: 1,
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn test_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = FsExportTarget::new(temp_dir.path().join("out"));

        let location = target.deliver(&result("in-10x10.jpg")).await.unwrap();

        let written = std::fs::read(temp_dir.path().join("out").join("in-10x10.jpg")).unwrap();
        assert_eq!(written, b"jpeg bytes");
        assert!(location.ends_with("in-10x10.jpg"));
    }

    #[tokio::test]
    async fn test_rejects_nested_paths() {
        let temp_dir = TempDir::new().unwrap();
        let target = FsExportTarget::new(temp_dir.path().to_path_buf());

        assert!(target.deliver(&result("../escape.jpg")).await.is_err());
        assert!(target.deliver(&result("")).await.is_err());
    }
}
