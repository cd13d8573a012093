//! Domain entity definitions.

mod analytics;
mod artifact;
mod batch;
mod cache_entry;
mod cache_key;
mod retry_policy;
mod upload;

pub use analytics::{
    AnalyticsAction, AnalyticsEvent, AnalyticsState, EVENT_LOG_CAPACITY, EventMetadata,
    PROCESSING_TIME_SAMPLE_CAPACITY, UsageStats, compression_ratio,
};
pub use artifact::{
    Artifact, ArtifactIdentity, DEFAULT_COMPRESSION_LEVEL, DEFAULT_MODEL_NAME, ProcessedImage,
    ProcessedResult, ProcessingParameters,
};
pub use batch::{BatchItem, BatchProgress, BatchReport, ItemFailure};
pub use cache_entry::{CacheEntry, CacheEntryMetadata};
pub use cache_key::{CACHE_KEY_VERSION, CacheKey, derive_key};
pub use retry_policy::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy,
};
pub use upload::{ApiKey, UploadOptions, UploadReceipt, UploadSummary};
