//! Cached, retried processing of a single artifact.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::services::{AnalyticsAggregator, EventBus, ResultCache, RetryExecutor};
use crate::domain::entities::{
    AnalyticsAction, Artifact, EventMetadata, ProcessedResult, ProcessingParameters, derive_key,
};
use crate::domain::errors::PipelineError;
use crate::domain::events::PipelineEvent;
use crate::domain::ports::ImageProcessorPort;
use crate::domain::services::derive_output_filename;

/// Serves results from the cache, or processes, caches and tracks them.
///
/// Cache and analytics failures are logged and never fail the request.
#[derive(Clone)]
pub struct ProcessArtifactUseCase {
    processor: Arc<dyn ImageProcessorPort>,
    cache: Arc<ResultCache>,
    analytics: Arc<AnalyticsAggregator>,
    retry: RetryExecutor,
    events: EventBus,
}

impl ProcessArtifactUseCase {
    /// Creates the use case.
    #[must_use]
    pub fn new(
        processor: Arc<dyn ImageProcessorPort>,
        cache: Arc<ResultCache>,
        analytics: Arc<AnalyticsAggregator>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            processor,
            cache,
            analytics,
            retry,
            events: EventBus::default(),
        }
    }

    /// Publishes retry notifications on the given bus.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Returns the processed form of `artifact`, using the configured processor on a miss.
    ///
    /// # Errors
    /// Returns `PipelineError::ExhaustedRetries` if the processor failed on
    /// every attempt.
    pub async fn lookup_or_process(
        &self,
        artifact: &Artifact,
        params: &ProcessingParameters,
    ) -> Result<ProcessedResult, PipelineError> {
        self.lookup_or_process_with(artifact, params, self.processor.as_ref())
            .await
    }

    /// Like [`Self::lookup_or_process`], but a miss runs `processor`.
    ///
    /// Results share the cache with every other processor, so callers must
    /// only swap in processors that produce the same output for a key.
    ///
    /// # Errors
    /// Returns `PipelineError::ExhaustedRetries` if `processor` failed on
    /// every attempt.
    pub async fn lookup_or_process_with(
        &self,
        artifact: &Artifact,
        params: &ProcessingParameters,
        processor: &dyn ImageProcessorPort,
    ) -> Result<ProcessedResult, PipelineError> {
        let key = derive_key(artifact.identity(), params);

        if let Some(entry) = self.cache.lookup(&key).await {
            debug!(file = %artifact.name(), key = %key, "Serving cached result");
            return Ok(ProcessedResult {
                source_name: artifact.name().to_string(),
                derived_filename: entry.metadata.derived_filename,
                bytes: entry.result_blob,
                original_size: artifact.identity().byte_size(),
                attempts: 0,
                from_cache: true,
            });
        }

        let started = Instant::now();
        let outcome = self
            .retry
            .execute_with_callback(
                || processor.process(artifact, params),
                |attempt, e| {
                    warn!(file = %artifact.name(), attempt, error = %e, "Processing attempt failed");
                    self.events.publish(PipelineEvent::RetryScheduled {
                        source_name: artifact.name().to_string(),
                        attempt,
                        message: e.to_string(),
                    });
                },
            )
            .await
            .map_err(|e| {
                error!(file = %artifact.name(), attempts = e.attempts(), error = %e.last_error(), "Processing failed");
                PipelineError::from(e)
            })?;
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let image = outcome.value;
        let derived_filename =
            derive_output_filename(artifact.name(), image.width, image.height, &image.extension);
        let result = ProcessedResult {
            source_name: artifact.name().to_string(),
            derived_filename,
            bytes: image.bytes,
            original_size: artifact.identity().byte_size(),
            attempts: outcome.attempts,
            from_cache: false,
        };

        // Failures are reported by the cache itself.
        let _ = self
            .cache
            .store(
                &key,
                result.bytes.clone(),
                &result.derived_filename,
                &result.source_name,
            )
            .await;

        self.track(&result, params, processing_time_ms).await;

        info!(
            file = %result.source_name,
            output = %result.derived_filename,
            original_size = result.original_size,
            processed_size = result.processed_size(),
            attempts = result.attempts,
            "Processed artifact"
        );

        Ok(result)
    }

    async fn track(&self, result: &ProcessedResult, params: &ProcessingParameters, processing_time_ms: f64) {
        let mut metadata = EventMetadata::new();
        metadata.insert("fileName".to_string(), result.source_name.clone().into());
        metadata.insert("originalSize".to_string(), result.original_size.into());
        metadata.insert("processedSize".to_string(), result.processed_size().into());
        metadata.insert("compressionLevel".to_string(), params.compression_level().into());
        metadata.insert("attempts".to_string(), result.attempts.into());
        self.analytics
            .record_event(AnalyticsAction::Process, metadata)
            .await;

        if params.background_removal() {
            let mut metadata = EventMetadata::new();
            metadata.insert("model".to_string(), params.model_name().into());
            self.analytics
                .record_event(AnalyticsAction::BackgroundRemoval, metadata)
                .await;
        }

        self.analytics
            .record_compression_stats(result.original_size, result.processed_size(), processing_time_ms)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ResultCacheConfig;
    use crate::domain::entities::{ArtifactIdentity, RetryPolicy};
    use crate::domain::errors::ProcessingError;
    use crate::domain::ports::mocks::{FaultyBlobStore, MockImageProcessor, MockRecordStore};
    use crate::infrastructure::storage::MemoryBlobStore;

    struct Fixture {
        use_case: ProcessArtifactUseCase,
        processor: Arc<MockImageProcessor>,
        cache: Arc<ResultCache>,
        analytics: Arc<AnalyticsAggregator>,
    }

    async fn create_fixture(processor: MockImageProcessor) -> Fixture {
        let processor = Arc::new(processor);
        let cache = Arc::new(ResultCache::new(
            Arc::new(MemoryBlobStore::new()),
            ResultCacheConfig::default(),
        ));
        let analytics = Arc::new(AnalyticsAggregator::open(Arc::new(MockRecordStore::new())).await);
        let use_case = ProcessArtifactUseCase::new(
            processor.clone(),
            cache.clone(),
            analytics.clone(),
            RetryExecutor::new(RetryPolicy::new(3, 100, 2.0).unwrap()),
        );
        Fixture {
            use_case,
            processor,
            cache,
            analytics,
        }
    }

    fn artifact(name: &str) -> Artifact {
        Artifact::new(ArtifactIdentity::new(name, 100, 1_700_000_000_000), vec![7u8; 100])
    }

    #[tokio::test]
    async fn test_miss_processes_and_caches() {
        let fixture = create_fixture(MockImageProcessor::new()).await;
        let params = ProcessingParameters::default();

        let first = fixture
            .use_case
            .lookup_or_process(&artifact("Summer Sale.PNG"), &params)
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.derived_filename, "summer-sale-64x32.jpg");
        assert_eq!(first.processed_size(), 50);

        let second = fixture
            .use_case
            .lookup_or_process(&artifact("Summer Sale.PNG"), &params)
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.bytes, first.bytes);
        assert_eq!(second.derived_filename, first.derived_filename);
        assert_eq!(fixture.processor.total_calls(), 1);

        let stats = fixture.analytics.usage_stats().await;
        assert_eq!(stats.total_images, 1);
        assert_eq!(stats.total_saved_bytes, 50);
        assert!((stats.average_compression_ratio - 0.5).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_processor_runs_on_miss_only() {
        let fixture = create_fixture(MockImageProcessor::new()).await;
        let other = MockImageProcessor::new();
        let params = ProcessingParameters::default();

        let first = fixture
            .use_case
            .lookup_or_process_with(&artifact("shoe.png"), &params, &other)
            .await
            .unwrap();
        let second = fixture
            .use_case
            .lookup_or_process(&artifact("shoe.png"), &params)
            .await
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(other.calls_for("shoe.png"), 1);
        assert_eq!(fixture.processor.calls_for("shoe.png"), 0);

        let failing = MockImageProcessor::new().failing_for("boot.png");
        let result = fixture
            .use_case
            .lookup_or_process_with(&artifact("boot.png"), &params, &failing)
            .await;
        assert!(matches!(result, Err(PipelineError::ExhaustedRetries { .. })));
        assert_eq!(failing.calls_for("boot.png"), 3);
    }

    #[tokio::test]
    async fn test_different_parameters_miss() {
        let fixture = create_fixture(MockImageProcessor::new()).await;

        fixture
            .use_case
            .lookup_or_process(&artifact("a.png"), &ProcessingParameters::new(80).unwrap())
            .await
            .unwrap();
        fixture
            .use_case
            .lookup_or_process(&artifact("a.png"), &ProcessingParameters::new(81).unwrap())
            .await
            .unwrap();

        assert_eq!(fixture.processor.calls_for("a.png"), 2);
        assert_eq!(fixture.cache.stats().await.entries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let fixture = create_fixture(MockImageProcessor::new().flaky_for("a.png", 2)).await;
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let use_case = fixture.use_case.clone().with_events(events);

        let result = use_case
            .lookup_or_process(&artifact("a.png"), &ProcessingParameters::default())
            .await
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert!(result.was_retried());
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::RetryScheduled { attempt: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_last_error() {
        let fixture = create_fixture(MockImageProcessor::new().failing_for("bad.png")).await;

        let err = fixture
            .use_case
            .lookup_or_process(&artifact("bad.png"), &ProcessingParameters::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PipelineError::ExhaustedRetries {
                attempts: 3,
                source: ProcessingError::failed("cannot process bad.png"),
            }
        );
        assert_eq!(fixture.processor.calls_for("bad.png"), 3);
        assert_eq!(fixture.cache.stats().await.entries, 0);
        assert_eq!(fixture.analytics.usage_stats().await.total_images, 0);
    }

    #[tokio::test]
    async fn test_cache_failure_does_not_fail_request() {
        let store = Arc::new(FaultyBlobStore::new(Arc::new(MemoryBlobStore::new())));
        store.fail_puts_ending_with(".blob");
        let cache = Arc::new(ResultCache::new(store, ResultCacheConfig::default()));
        let analytics = Arc::new(AnalyticsAggregator::open(Arc::new(MockRecordStore::new())).await);
        let processor = Arc::new(MockImageProcessor::new());
        let use_case = ProcessArtifactUseCase::new(
            processor.clone(),
            cache,
            analytics,
            RetryExecutor::default(),
        );

        for _ in 0..2 {
            let result = use_case
                .lookup_or_process(&artifact("a.png"), &ProcessingParameters::default())
                .await
                .unwrap();
            assert!(!result.from_cache);
        }
        assert_eq!(processor.calls_for("a.png"), 2);
    }

    #[tokio::test]
    async fn test_background_removal_is_tracked() {
        let fixture = create_fixture(MockImageProcessor::new()).await;
        let params = ProcessingParameters::default().with_background_removal("isnet");

        fixture
            .use_case
            .lookup_or_process(&artifact("a.png"), &params)
            .await
            .unwrap();

        let stats = fixture.analytics.usage_stats().await;
        assert_eq!(stats.total_images, 1);
        assert_eq!(stats.background_removal_count, 1);
    }
}
