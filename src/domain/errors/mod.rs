//! Domain error types.

mod parameter_error;
mod processing_error;
mod store_error;
mod upload_error;

pub use parameter_error::ParameterError;
pub use processing_error::{PipelineError, ProcessingError, RetryError};
pub use store_error::{StoreError, StoreResult};
pub use upload_error::UploadError;
