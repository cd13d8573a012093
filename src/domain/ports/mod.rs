mod blob_store_port;
mod clock_port;
mod export_target_port;
mod image_processor_port;
mod record_store_port;
mod upload_sink_port;

pub use blob_store_port::BlobStorePort;
pub use clock_port::{Clock, SystemClock};
pub use export_target_port::ExportTargetPort;
pub use image_processor_port::ImageProcessorPort;
pub use record_store_port::RecordStorePort;
pub use upload_sink_port::UploadSinkPort;

#[cfg(test)]
pub mod mocks {
    pub use super::blob_store_port::mock::FaultyBlobStore;
    pub use super::clock_port::mock::ManualClock;
    pub use super::export_target_port::mock::RecordingExportTarget;
    pub use super::image_processor_port::mock::MockImageProcessor;
    pub use super::record_store_port::mock::MockRecordStore;
    pub use super::upload_sink_port::MockUploadSinkPort;
}
