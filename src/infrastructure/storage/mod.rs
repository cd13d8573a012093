//! Blob and record store adapters.

mod fs_blob_store;
mod fs_record_store;
mod memory_blob_store;

pub use fs_blob_store::FsBlobStore;
pub use fs_record_store::FsRecordStore;
pub use memory_blob_store::MemoryBlobStore;
