//! Use case implementations.

mod batch_upload_use_case;
mod export_results_use_case;
mod process_artifact_use_case;
mod process_batch_use_case;

pub use batch_upload_use_case::BatchUploadUseCase;
pub use export_results_use_case::ExportResultsUseCase;
pub use process_artifact_use_case::ProcessArtifactUseCase;
pub use process_batch_use_case::ProcessBatchUseCase;
