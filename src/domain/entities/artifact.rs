//! Input artifacts, the parameters they are processed with, and the results.

use bytes::Bytes;
use serde::Serialize;

use crate::domain::errors::ParameterError;

/// Identity of an input artifact, captured once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactIdentity {
    name: String,
    byte_size: u64,
    last_modified_ms: i64,
}

impl ArtifactIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(name: impl Into<String>, byte_size: u64, last_modified_ms: i64) -> Self {
        Self {
            name: name.into(),
            byte_size,
            last_modified_ms,
        }
    }

    /// Returns the file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size of the source file in bytes.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Returns the last modification time in milliseconds since the epoch.
    #[must_use]
    pub const fn last_modified_ms(&self) -> i64 {
        self.last_modified_ms
    }
}

/// An input image: identity plus raw bytes.
#[derive(Debug, Clone)]
pub struct Artifact {
    identity: ArtifactIdentity,
    bytes: Bytes,
}

impl Artifact {
    /// Creates an artifact from already-read bytes.
    #[must_use]
    pub fn new(identity: ArtifactIdentity, bytes: impl Into<Bytes>) -> Self {
        Self {
            identity,
            bytes: bytes.into(),
        }
    }

    /// Returns the artifact identity.
    #[must_use]
    pub const fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    /// Returns the file name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

/// Default JPEG quality used when nothing else is configured.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 80;

/// Default background removal model.
pub const DEFAULT_MODEL_NAME: &str = "u2net";

/// Processing parameters for one request.
///
/// A dimension of `0` means "unbounded".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingParameters {
    compression_level: u32,
    max_width: u32,
    max_height: u32,
    background_removal: bool,
    model_name: String,
}

impl ProcessingParameters {
    /// Creates parameters with the given compression level and no other changes.
    ///
    /// # Errors
    /// Returns error if `compression_level` is outside `1..=100`.
    pub fn new(compression_level: u32) -> Result<Self, ParameterError> {
        if !(1..=100).contains(&compression_level) {
            return Err(ParameterError::CompressionLevelOutOfRange {
                level: compression_level,
            });
        }

        Ok(Self {
            compression_level,
            max_width: 0,
            max_height: 0,
            background_removal: false,
            model_name: DEFAULT_MODEL_NAME.to_string(),
        })
    }

    /// Sets the bounding box the output must fit in.
    #[must_use]
    pub const fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Enables background removal with the given model.
    #[must_use]
    pub fn with_background_removal(mut self, model_name: impl Into<String>) -> Self {
        self.background_removal = true;
        self.model_name = model_name.into();
        self
    }

    /// Sets the model name without toggling background removal.
    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Returns the compression level (1-100).
    #[must_use]
    pub const fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Returns the maximum width, `0` if unbounded.
    #[must_use]
    pub const fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Returns the maximum height, `0` if unbounded.
    #[must_use]
    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Returns whether background removal is requested.
    #[must_use]
    pub const fn background_removal(&self) -> bool {
        self.background_removal
    }

    /// Returns the background removal model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_width: 0,
            max_height: 0,
            background_removal: false,
            model_name: DEFAULT_MODEL_NAME.to_string(),
        }
    }
}

/// Raw output of an image processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Encoded output bytes.
    pub bytes: Bytes,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// File extension of the output encoding, without the dot.
    pub extension: String,
}

/// A processed artifact as handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedResult {
    /// Name of the source artifact.
    pub source_name: String,
    /// Output file name.
    pub derived_filename: String,
    /// Encoded output bytes.
    pub bytes: Bytes,
    /// Size of the source artifact in bytes.
    pub original_size: u64,
    /// Processor attempts used, `0` when served from cache.
    pub attempts: u32,
    /// Whether the result came from the result cache.
    pub from_cache: bool,
}

impl ProcessedResult {
    /// Returns the size of the processed output.
    #[must_use]
    pub fn processed_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns whether the processor needed more than one attempt.
    #[must_use]
    pub const fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}
