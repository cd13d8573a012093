//! Port for the upload/export target.

use async_trait::async_trait;

use crate::domain::entities::{ProcessedResult, UploadOptions, UploadReceipt};
use crate::domain::errors::UploadError;

/// Remote target accepting processed images.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadSinkPort: Send + Sync {
    /// Uploads one processed image.
    async fn upload(
        &self,
        result: &ProcessedResult,
        options: &UploadOptions,
    ) -> Result<UploadReceipt, UploadError>;
}
