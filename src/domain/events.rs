//! Structured events published by the processing core.

use crate::domain::entities::{BatchProgress, CacheKey};

/// Event published on the pipeline event bus.
///
/// Non-fatal failures that are swallowed (cache I/O, analytics persistence)
/// are reported here so a host can surface them.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum PipelineEvent {
    CacheHit {
        key: CacheKey,
    },
    CacheMiss {
        key: CacheKey,
    },
    CacheStoreFailed {
        key: CacheKey,
        message: String,
    },
    CacheEvicted {
        key: CacheKey,
    },
    RetryScheduled {
        source_name: String,
        attempt: u32,
        message: String,
    },
    ItemFailed {
        index: usize,
        message: String,
    },
    BatchProgressed(BatchProgress),
    AnalyticsPersistFailed {
        message: String,
    },
}

impl PipelineEvent {
    /// Returns true for events that report a swallowed failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::CacheStoreFailed { .. } | Self::ItemFailed { .. } | Self::AnalyticsPersistFailed { .. }
        )
    }

    /// Returns true for cache or analytics writes that failed without
    /// failing the operation that caused them.
    #[must_use]
    pub const fn is_write_failure(&self) -> bool {
        matches!(
            self,
            Self::CacheStoreFailed { .. } | Self::AnalyticsPersistFailed { .. }
        )
    }
}
