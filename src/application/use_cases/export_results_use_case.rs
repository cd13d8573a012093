//! Exports processed results through the staggered download queue.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{AnalyticsAggregator, Delivery, DownloadQueue};
use crate::domain::entities::{AnalyticsAction, EventMetadata, ProcessedResult};

/// Tracks a bulk download and hands the results to the queue.
#[derive(Clone)]
pub struct ExportResultsUseCase {
    queue: DownloadQueue,
    analytics: Arc<AnalyticsAggregator>,
}

impl ExportResultsUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(queue: DownloadQueue, analytics: Arc<AnalyticsAggregator>) -> Self {
        Self { queue, analytics }
    }

    /// Exports the results, one report per result in input order.
    pub async fn execute(&self, results: Vec<ProcessedResult>) -> Vec<Delivery> {
        if results.is_empty() {
            debug!("Nothing to export");
            return Vec::new();
        }

        let total_size: u64 = results.iter().map(ProcessedResult::processed_size).sum();
        let mut metadata = EventMetadata::new();
        metadata.insert("bulk".to_string(), true.into());
        metadata.insert("count".to_string(), results.len().into());
        metadata.insert("totalSize".to_string(), total_size.into());
        self.analytics
            .record_event(AnalyticsAction::Download, metadata)
            .await;

        self.queue.enqueue(results).await
    }
}
