//! Application layer with services and use cases.

/// Caching, retry, batching and analytics services.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use services::{
    AnalyticsAggregator, BatchOrchestrator, CancellationHandle, DownloadQueue, EventBus,
    ResultCache, ResultCacheConfig, RetryExecutor,
};
pub use use_cases::{
    BatchUploadUseCase, ExportResultsUseCase, ProcessArtifactUseCase, ProcessBatchUseCase,
};
