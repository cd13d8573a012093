//! Usage analytics state and the pure operations on it.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of events kept in the log.
pub const EVENT_LOG_CAPACITY: usize = 100;

/// Maximum number of processing time samples kept.
pub const PROCESSING_TIME_SAMPLE_CAPACITY: usize = 1000;

/// Kind of tracked action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsAction {
    /// A single artifact was processed.
    Process,
    /// Results were exported.
    Download,
    /// A batch run started or finished. Logged only, never counted.
    BatchProcess,
    /// Background removal was applied.
    BackgroundRemoval,
}

impl std::fmt::Display for AnalyticsAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Download => write!(f, "download"),
            Self::BatchProcess => write!(f, "batch_process"),
            Self::BackgroundRemoval => write!(f, "background_removal"),
        }
    }
}

/// Free-form event metadata.
pub type EventMetadata = serde_json::Map<String, serde_json::Value>;

/// A tracked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// What happened.
    pub action: AnalyticsAction,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Extra details supplied by the caller.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: EventMetadata,
}

/// Persisted analytics record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsState {
    /// Most recent events, oldest first.
    pub events: VecDeque<AnalyticsEvent>,
    /// Count of `process` events.
    pub images_processed: u64,
    /// Count of `download` events.
    pub downloads: u64,
    /// Count of `background_removal` events.
    pub background_removals: u64,
    /// Sum of `original - processed` over all samples. Negative when outputs grew.
    pub total_bytes_saved: i64,
    /// Equal-weight mean of all compression ratios recorded.
    pub average_compression_ratio: f64,
    /// Number of compression samples folded into the mean.
    pub compression_samples: u64,
    /// Most recent processing times in milliseconds, oldest first.
    pub processing_time_samples: VecDeque<f64>,
    /// Time of the last tracked event.
    pub last_session: Option<DateTime<Utc>>,
}

impl AnalyticsState {
    /// Appends an event and bumps the matching counter.
    pub fn apply_event(&mut self, event: AnalyticsEvent) {
        match event.action {
            AnalyticsAction::Process => self.images_processed += 1,
            AnalyticsAction::Download => self.downloads += 1,
            AnalyticsAction::BackgroundRemoval => self.background_removals += 1,
            AnalyticsAction::BatchProcess => {}
        }

        self.last_session = Some(event.timestamp);
        self.events.push_back(event);
        while self.events.len() > EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
    }

    /// Folds one compression sample into the running statistics.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    pub fn apply_compression_sample(
        &mut self,
        original_size: u64,
        processed_size: u64,
        processing_time_ms: f64,
    ) {
        let saved = (original_size as i64).saturating_sub(processed_size as i64);
        self.total_bytes_saved = self.total_bytes_saved.saturating_add(saved);

        self.processing_time_samples.push_back(processing_time_ms);
        while self.processing_time_samples.len() > PROCESSING_TIME_SAMPLE_CAPACITY {
            self.processing_time_samples.pop_front();
        }

        let ratio = compression_ratio(original_size, processed_size);
        self.compression_samples += 1;
        let n = self.compression_samples as f64;
        self.average_compression_ratio = (self.average_compression_ratio * (n - 1.0) + ratio) / n;
    }

    /// Derives read-only usage statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_stats(&self) -> UsageStats {
        let total_sessions_count = self
            .events
            .iter()
            .map(|e| e.timestamp.date_naive())
            .collect::<BTreeSet<_>>()
            .len();

        let average_processing_time_ms = if self.processing_time_samples.is_empty() {
            0.0
        } else {
            self.processing_time_samples.iter().sum::<f64>()
                / self.processing_time_samples.len() as f64
        };

        UsageStats {
            total_images: self.images_processed,
            total_downloads: self.downloads,
            background_removal_count: self.background_removals,
            total_saved_bytes: self.total_bytes_saved,
            average_compression_ratio: self.average_compression_ratio,
            average_processing_time_ms,
            total_sessions_count,
            last_session: self.last_session,
        }
    }
}

/// Fraction of the original size saved, `1 - processed / original`.
///
/// Zero-sized originals yield `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compression_ratio(original_size: u64, processed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    1.0 - (processed_size as f64 / original_size as f64)
}

/// Derived usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Images processed.
    pub total_images: u64,
    /// Export events.
    pub total_downloads: u64,
    /// Background removals.
    pub background_removal_count: u64,
    /// Total bytes saved.
    pub total_saved_bytes: i64,
    /// Mean compression ratio.
    pub average_compression_ratio: f64,
    /// Mean of the retained processing time samples.
    pub average_processing_time_ms: f64,
    /// Distinct UTC calendar days present in the event log.
    pub total_sessions_count: usize,
    /// Time of the last tracked event.
    pub last_session: Option<DateTime<Utc>>,
}
