//! Reads input files into artifacts.

use std::path::Path;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tokio::fs;
use tracing::trace;

use crate::domain::entities::{Artifact, ArtifactIdentity};

/// Errors raised while reading an input file.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum IngestError {
    #[error("{path}: not a file")]
    NotAFile { path: String },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reads `path` and captures its identity: file name, size and modification time.
///
/// # Errors
/// Returns error if the path is not a readable regular file.
pub async fn read_artifact(path: &Path) -> Result<Artifact, IngestError> {
    let display = path.display().to_string();
    let io_error = |source| IngestError::Io {
        path: display.clone(),
        source,
    };

    let metadata = fs::metadata(path).await.map_err(io_error)?;
    if !metadata.is_file() {
        return Err(IngestError::NotAFile {
            path: display.clone(),
        });
    }

    let last_modified_ms = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default();

    let bytes = fs::read(path).await.map_err(io_error)?;
    let name = path
        .file_name()
        .map_or_else(|| display.clone(), |name| name.to_string_lossy().into_owned());

    trace!(file = %name, size = bytes.len(), last_modified_ms, "Read artifact");
    let identity = ArtifactIdentity::new(name, bytes.len() as u64, last_modified_ms);
    Ok(Artifact::new(identity, bytes))
}
