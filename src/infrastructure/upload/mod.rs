//! Upload sink adapters.

mod http_upload_sink;

pub use http_upload_sink::HttpUploadSink;
