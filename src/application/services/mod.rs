//! Application services shared by the use cases.

mod analytics_aggregator;
mod batch_orchestrator;
mod download_queue;
mod event_bus;
mod result_cache;
mod retry_executor;

pub use analytics_aggregator::{ANALYTICS_RECORD_NAME, AnalyticsAggregator};
pub use batch_orchestrator::{BatchOrchestrator, CancellationHandle, DEFAULT_MAX_CONCURRENCY};
pub use download_queue::{DEFAULT_STAGGER, Delivery, DownloadQueue};
pub use event_bus::{DEFAULT_EVENT_CAPACITY, EventBus};
pub use result_cache::{
    CACHE_NAMESPACE_PREFIX, CacheStats, DEFAULT_MAX_AGE_DAYS, DEFAULT_MAX_ENTRIES,
    DEFAULT_MAX_TOTAL_BYTES, ResultCache, ResultCacheConfig,
};
pub use retry_executor::{RetryExecutor, RetryOutcome};
