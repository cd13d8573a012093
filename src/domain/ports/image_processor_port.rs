//! Port for the external image processing function.

use async_trait::async_trait;

use crate::domain::entities::{Artifact, ProcessedImage, ProcessingParameters};
use crate::domain::errors::ProcessingError;

/// Turns an artifact into a processed image. Any failure is retryable.
#[async_trait]
pub trait ImageProcessorPort: Send + Sync {
    /// Processes one artifact.
    async fn process(
        &self,
        artifact: &Artifact,
        params: &ProcessingParameters,
    ) -> Result<ProcessedImage, ProcessingError>;
}
