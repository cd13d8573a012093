//! Batch processing through the cached pipeline.

use std::sync::Arc;

use tokio::time::Instant;

use crate::application::services::{AnalyticsAggregator, BatchOrchestrator, CancellationHandle};
use crate::application::use_cases::ProcessArtifactUseCase;
use crate::domain::entities::{
    AnalyticsAction, Artifact, BatchItem, BatchReport, EventMetadata, ProcessedResult,
    ProcessingParameters,
};

/// Processes the selected artifacts of a batch and tracks the run.
#[derive(Clone)]
pub struct ProcessBatchUseCase {
    pipeline: ProcessArtifactUseCase,
    orchestrator: Arc<BatchOrchestrator>,
    analytics: Arc<AnalyticsAggregator>,
}

impl ProcessBatchUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(
        pipeline: ProcessArtifactUseCase,
        orchestrator: Arc<BatchOrchestrator>,
        analytics: Arc<AnalyticsAggregator>,
    ) -> Self {
        Self {
            pipeline,
            orchestrator,
            analytics,
        }
    }

    /// Runs the batch. Item failures end up in the report.
    pub async fn execute(
        &self,
        items: Vec<BatchItem<Artifact>>,
        params: &ProcessingParameters,
        cancellation: &CancellationHandle,
    ) -> BatchReport<ProcessedResult> {
        let total_images = items.iter().filter(|i| i.selected).count();
        let model = if params.background_removal() {
            params.model_name()
        } else {
            "none"
        };

        let mut started = EventMetadata::new();
        started.insert("started".to_string(), true.into());
        started.insert("totalImages".to_string(), total_images.into());
        started.insert("compressionLevel".to_string(), params.compression_level().into());
        started.insert("maxWidth".to_string(), params.max_width().into());
        started.insert("maxHeight".to_string(), params.max_height().into());
        started.insert("removeBackground".to_string(), params.background_removal().into());
        started.insert("model".to_string(), model.into());
        self.analytics
            .record_event(AnalyticsAction::BatchProcess, started)
            .await;

        let timer = Instant::now();
        let report = self
            .orchestrator
            .run_batch(
                items,
                move |_, artifact| async move { self.pipeline.lookup_or_process(&artifact, params).await },
                cancellation,
            )
            .await;

        let retried_count = report
            .outputs
            .iter()
            .filter(|(_, result)| result.was_retried())
            .count();

        let mut completed = EventMetadata::new();
        completed.insert("completed".to_string(), true.into());
        completed.insert("totalImages".to_string(), total_images.into());
        completed.insert("processedCount".to_string(), report.progress.succeeded_items.into());
        completed.insert("failedCount".to_string(), report.progress.failed_items.into());
        completed.insert("retriedCount".to_string(), retried_count.into());
        completed.insert("cancelled".to_string(), report.cancelled.into());
        completed.insert(
            "processingTimeMs".to_string(),
            (timer.elapsed().as_secs_f64() * 1000.0).into(),
        );
        completed.insert("model".to_string(), model.into());
        self.analytics
            .record_event(AnalyticsAction::BatchProcess, completed)
            .await;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{ResultCache, ResultCacheConfig, RetryExecutor};
    use crate::domain::entities::{ArtifactIdentity, RetryPolicy};
    use crate::domain::ports::mocks::{MockImageProcessor, MockRecordStore};
    use crate::infrastructure::storage::MemoryBlobStore;

    async fn create_use_case(
        processor: MockImageProcessor,
    ) -> (ProcessBatchUseCase, Arc<AnalyticsAggregator>) {
        let cache = Arc::new(ResultCache::new(
            Arc::new(MemoryBlobStore::new()),
            ResultCacheConfig::default(),
        ));
        let analytics = Arc::new(AnalyticsAggregator::open(Arc::new(MockRecordStore::new())).await);
        let pipeline = ProcessArtifactUseCase::new(
            Arc::new(processor),
            cache,
            analytics.clone(),
            RetryExecutor::new(RetryPolicy::new(2, 10, 1.0).unwrap()),
        );
        let use_case = ProcessBatchUseCase::new(
            pipeline,
            Arc::new(BatchOrchestrator::default()),
            analytics.clone(),
        );
        (use_case, analytics)
    }

    fn items(n: usize) -> Vec<BatchItem<Artifact>> {
        (0..n)
            .map(|i| {
                let name = format!("photo{i}.png");
                BatchItem::selected(Artifact::new(ArtifactIdentity::new(name, 40, 0), vec![1u8; 40]))
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_reports_failures_and_retries() {
        let processor = MockImageProcessor::new()
            .failing_for("photo2.png")
            .flaky_for("photo4.png", 1);
        let (use_case, analytics) = create_use_case(processor).await;

        let report = use_case
            .execute(items(6), &ProcessingParameters::default(), &CancellationHandle::new())
            .await;

        assert_eq!(report.progress.succeeded_items, 5);
        assert_eq!(report.progress.failed_items, 1);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].message, "processing failed: cannot process photo2.png");

        let state = analytics.snapshot().await;
        let batch_events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.action == AnalyticsAction::BatchProcess)
            .collect();
        assert_eq!(batch_events.len(), 2);
        assert_eq!(batch_events[0].metadata["totalImages"], 6);
        assert_eq!(batch_events[1].metadata["processedCount"], 5);
        assert_eq!(batch_events[1].metadata["failedCount"], 1);
        assert_eq!(batch_events[1].metadata["retriedCount"], 1);
        assert_eq!(batch_events[1].metadata["cancelled"], false);
        assert_eq!(state.images_processed, 5);
    }

    #[tokio::test]
    async fn test_unselected_items_are_not_processed() {
        let (use_case, analytics) = create_use_case(MockImageProcessor::new()).await;
        let mut batch = items(3);
        batch[1].selected = false;

        let report = use_case
            .execute(batch, &ProcessingParameters::default(), &CancellationHandle::new())
            .await;

        assert_eq!(report.progress.total_items, 2);
        assert_eq!(
            report.outputs.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(analytics.usage_stats().await.total_images, 2);
    }
}
