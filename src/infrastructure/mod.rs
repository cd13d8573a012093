//! Infrastructure layer with adapters for storage, processing and delivery.

/// Application configuration.
pub mod config;
/// Export targets.
pub mod export;
/// Input file reading.
pub mod ingest;
/// Image processors.
pub mod processing;
/// Blob and record stores.
pub mod storage;
/// Upload sinks.
pub mod upload;

pub use config::{AppConfig, CliArgs, Command, ConfigError, LogLevel, StorageManager};
pub use export::FsExportTarget;
pub use ingest::{IngestError, read_artifact};
pub use processing::ImageCrateProcessor;
pub use storage::{FsBlobStore, FsRecordStore, MemoryBlobStore};
pub use upload::HttpUploadSink;
