//! Persistent usage analytics.
//!
//! The whole state is one JSON record. A mutation holds the state lock
//! until the record it produced has been written.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::services::EventBus;
use crate::domain::entities::{
    AnalyticsAction, AnalyticsEvent, AnalyticsState, EventMetadata, UsageStats,
};
use crate::domain::errors::StoreResult;
use crate::domain::events::PipelineEvent;
use crate::domain::ports::{Clock, RecordStorePort, SystemClock};

/// Name of the persisted analytics record.
pub const ANALYTICS_RECORD_NAME: &str = "image_processor_analytics";

/// Aggregates tracked events into counters and running averages.
pub struct AnalyticsAggregator {
    store: Arc<dyn RecordStorePort>,
    state: Mutex<AnalyticsState>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl AnalyticsAggregator {
    /// Loads persisted state, falling back to an empty state when the record
    /// is missing, unreadable or malformed.
    pub async fn open(store: Arc<dyn RecordStorePort>) -> Self {
        let state = match store.get(ANALYTICS_RECORD_NAME).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Malformed analytics record, starting fresh");
                AnalyticsState::default()
            }),
            Ok(None) => AnalyticsState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load analytics, starting fresh");
                AnalyticsState::default()
            }
        };

        Self {
            store,
            state: Mutex::new(state),
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
        }
    }

    /// Replaces the clock used for event timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publishes persistence failures on the given bus.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Tracks an event and persists the new state.
    pub async fn record_event(&self, action: AnalyticsAction, metadata: EventMetadata) {
        let mut state = self.state.lock().await;
        state.apply_event(AnalyticsEvent {
            action,
            timestamp: self.clock.now(),
            metadata,
        });
        debug!(action = %action, "Tracked analytics event");
        self.persist(&state).await;
    }

    /// Folds a compression sample into the statistics and persists the new state.
    pub async fn record_compression_stats(
        &self,
        original_size: u64,
        processed_size: u64,
        processing_time_ms: f64,
    ) {
        let mut state = self.state.lock().await;
        state.apply_compression_sample(original_size, processed_size, processing_time_ms);
        self.persist(&state).await;
    }

    /// Returns derived statistics without mutating anything.
    pub async fn usage_stats(&self) -> UsageStats {
        self.state.lock().await.usage_stats()
    }

    /// Returns a copy of the full state.
    pub async fn snapshot(&self) -> AnalyticsState {
        self.state.lock().await.clone()
    }

    /// Resets to the empty state and removes the persisted record.
    ///
    /// # Errors
    /// Returns error if the persisted record cannot be removed. The in-memory
    /// state is reset regardless.
    pub async fn clear(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        *state = AnalyticsState::default();
        self.store.remove(ANALYTICS_RECORD_NAME).await
    }

    async fn persist(&self, state: &AnalyticsState) {
        let result = match serde_json::to_string(state) {
            Ok(raw) => self.store.set(ANALYTICS_RECORD_NAME, &raw).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist analytics");
            self.events.publish(PipelineEvent::AnalyticsPersistFailed {
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::compression_ratio;
    use crate::domain::ports::mocks::{ManualClock, MockRecordStore};
    use chrono::{TimeZone, Utc};

    async fn create_test_aggregator() -> (AnalyticsAggregator, Arc<MockRecordStore>) {
        let store = Arc::new(MockRecordStore::new());
        let aggregator = AnalyticsAggregator::open(store.clone()).await;
        (aggregator, store)
    }

    fn indexed(n: usize) -> EventMetadata {
        let mut metadata = EventMetadata::new();
        metadata.insert("n".to_string(), n.into());
        metadata
    }

    #[tokio::test]
    async fn test_incremental_mean_matches_full_mean() {
        let (aggregator, _store) = create_test_aggregator().await;

        // Ratios 0.5, 0.7, 0.3.
        aggregator.record_compression_stats(1000, 500, 10.0).await;
        aggregator.record_compression_stats(1000, 300, 20.0).await;
        aggregator.record_compression_stats(1000, 700, 30.0).await;

        let stats = aggregator.usage_stats().await;
        assert!((stats.average_compression_ratio - 0.5).abs() < 1e-9);
        assert!((stats.average_processing_time_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats.total_saved_bytes, 1500);
    }

    #[tokio::test]
    #[allow(clippy::cast_precision_loss)]
    async fn test_running_mean_survives_reopen() {
        let store = Arc::new(MockRecordStore::new());
        let aggregator = AnalyticsAggregator::open(store.clone()).await;
        let mut ratios = Vec::new();

        let sample = |i: u64| (1000 + i % 97, (i * 31) % 1500);
        for i in 0..1100 {
            let (original, processed) = sample(i);
            aggregator
                .record_compression_stats(original, processed, 1.0)
                .await;
            ratios.push(compression_ratio(original, processed));
        }

        let reopened = AnalyticsAggregator::open(store).await;
        let expected = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let state = reopened.snapshot().await;
        assert_eq!(state.compression_samples, 1100);
        assert!((state.average_compression_ratio - expected).abs() < 1e-9);

        for i in 1100..1300 {
            let (original, processed) = sample(i);
            reopened
                .record_compression_stats(original, processed, 1.0)
                .await;
            ratios.push(compression_ratio(original, processed));
        }

        let expected = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let stats = reopened.usage_stats().await;
        assert!((stats.average_compression_ratio - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_negative_savings_are_kept() {
        let (aggregator, _store) = create_test_aggregator().await;

        aggregator.record_compression_stats(100, 150, 1.0).await;

        let stats = aggregator.usage_stats().await;
        assert_eq!(stats.total_saved_bytes, -50);
        assert!((stats.average_compression_ratio + 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_event_log_is_bounded_fifo() {
        let (aggregator, _store) = create_test_aggregator().await;

        for n in 0..105 {
            aggregator
                .record_event(AnalyticsAction::Process, indexed(n))
                .await;
        }

        let state = aggregator.snapshot().await;
        assert_eq!(state.events.len(), 100);
        assert_eq!(state.events.front().unwrap().metadata["n"], 5);
        assert_eq!(state.events.back().unwrap().metadata["n"], 104);
        assert_eq!(state.images_processed, 105);
    }

    #[tokio::test]
    async fn test_batch_events_are_not_counted() {
        let (aggregator, _store) = create_test_aggregator().await;

        aggregator
            .record_event(AnalyticsAction::BatchProcess, EventMetadata::new())
            .await;
        aggregator
            .record_event(AnalyticsAction::BackgroundRemoval, EventMetadata::new())
            .await;

        let stats = aggregator.usage_stats().await;
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.background_removal_count, 1);
        assert_eq!(aggregator.snapshot().await.events.len(), 2);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let store = Arc::new(MockRecordStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        ));
        let aggregator = AnalyticsAggregator::open(store.clone())
            .await
            .with_clock(clock.clone());

        aggregator
            .record_event(AnalyticsAction::Download, EventMetadata::new())
            .await;
        clock.advance(chrono::Duration::days(1));
        aggregator
            .record_event(AnalyticsAction::Download, EventMetadata::new())
            .await;

        let reopened = AnalyticsAggregator::open(store).await;
        let stats = reopened.usage_stats().await;
        assert_eq!(stats.total_downloads, 2);
        assert_eq!(stats.total_sessions_count, 2);
        assert_eq!(stats.last_session, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_malformed_record_falls_back_to_default() {
        let store = Arc::new(MockRecordStore::with_record(
            ANALYTICS_RECORD_NAME,
            "{not json",
        ));
        let aggregator = AnalyticsAggregator::open(store).await;

        assert_eq!(aggregator.snapshot().await, AnalyticsState::default());
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_not_raised() {
        let store = Arc::new(MockRecordStore::new());
        store.reject_writes().await;
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let aggregator = AnalyticsAggregator::open(store).await.with_events(events);

        aggregator
            .record_event(AnalyticsAction::Process, EventMetadata::new())
            .await;

        assert_eq!(aggregator.usage_stats().await.total_images, 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::AnalyticsPersistFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_resets_state_and_record() {
        let (aggregator, store) = create_test_aggregator().await;
        aggregator
            .record_event(AnalyticsAction::Process, EventMetadata::new())
            .await;
        aggregator.record_compression_stats(10, 5, 1.0).await;
        assert!(store.raw(ANALYTICS_RECORD_NAME).await.is_some());

        aggregator.clear().await.unwrap();

        assert_eq!(aggregator.snapshot().await, AnalyticsState::default());
        assert!(store.raw(ANALYTICS_RECORD_NAME).await.is_none());
        assert_eq!(aggregator.usage_stats().await.total_sessions_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let (aggregator, store) = create_test_aggregator().await;
        let aggregator = Arc::new(aggregator);

        let mut handles = Vec::new();
        for n in 0..20 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                aggregator
                    .record_event(AnalyticsAction::Process, indexed(n))
                    .await;
                aggregator.record_compression_stats(100, 50, 1.0).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let persisted: AnalyticsState =
            serde_json::from_str(&store.raw(ANALYTICS_RECORD_NAME).await.unwrap()).unwrap();
        assert_eq!(persisted.images_processed, 20);
        assert_eq!(persisted.compression_samples, 20);
        assert_eq!(persisted.total_bytes_saved, 1000);
    }
}
