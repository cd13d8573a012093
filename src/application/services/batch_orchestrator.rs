//! Bounded-concurrency batch runner with per-item failure isolation.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::services::EventBus;
use crate::domain::entities::{BatchItem, BatchProgress, BatchReport, ItemFailure};
use crate::domain::events::PipelineEvent;

/// Default number of items processed at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Cooperative cancellation flag shared between a batch and its caller.
///
/// Once cancelled no new items start. Items already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Creates a handle that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the cancellation signal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs an operation over the selected items of a batch.
///
/// All progress updates happen on the task driving the batch, so concurrent
/// completions never lose counts.
pub struct BatchOrchestrator {
    max_concurrency: usize,
    progress_tx: watch::Sender<BatchProgress>,
    events: EventBus,
}

impl BatchOrchestrator {
    /// Creates an orchestrator running at most `max_concurrency` items at once.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        let (progress_tx, _) = watch::channel(BatchProgress::default());
        Self {
            max_concurrency: max_concurrency.max(1),
            progress_tx,
            events: EventBus::default(),
        }
    }

    /// Publishes progress and item failures on the given bus.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Returns the concurrency bound.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Subscribes to progress of the current and future runs.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    /// Runs `operation` over every selected item.
    ///
    /// `operation` receives the item's position in `items`. Failures are
    /// recorded and never abort the batch. Outputs and failures in the report
    /// are sorted by that position.
    pub async fn run_batch<I, T, E, F, Fut>(
        &self,
        items: Vec<BatchItem<I>>,
        operation: F,
        cancellation: &CancellationHandle,
    ) -> BatchReport<T>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut pending = items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| item.selected)
            .map(|(index, item)| (index, item.item))
            .collect::<Vec<_>>()
            .into_iter();

        let mut progress = BatchProgress::new(pending.len());
        self.progress_tx.send_replace(progress);
        info!(
            total = progress.total_items,
            concurrency = self.max_concurrency,
            "Starting batch"
        );

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.max_concurrency {
                if cancellation.is_cancelled() {
                    debug!(in_flight = in_flight.len(), "Batch cancelled, draining in-flight items");
                    break;
                }
                let Some((index, item)) = pending.next() else {
                    break;
                };
                let fut = operation(index, item);
                in_flight.push(async move { (index, fut.await) });
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(value) => {
                    progress.record_success();
                    outputs.push((index, value));
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(index, error = %message, "Batch item failed");
                    progress.record_failure();
                    self.events.publish(PipelineEvent::ItemFailed {
                        index,
                        message: message.clone(),
                    });
                    failures.push(ItemFailure { index, message });
                }
            }

            self.progress_tx.send_replace(progress);
            self.events.publish(PipelineEvent::BatchProgressed(progress));
        }

        let skipped_items = pending.len();
        let cancelled = cancellation.is_cancelled();

        outputs.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|f| f.index);

        info!(
            succeeded = progress.succeeded_items,
            failed = progress.failed_items,
            skipped = skipped_items,
            cancelled,
            "Batch finished"
        );

        BatchReport {
            progress,
            outputs,
            failures,
            cancelled,
            skipped_items,
        }
    }
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}
