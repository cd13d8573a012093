//! Broadcast channel for pipeline events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::events::PipelineEvent;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Cloneable publisher handle. Publishing never fails; without
/// subscribers events are dropped.
///
/// Write failures are also counted at publish time, so the count holds
/// even for subscribers that lag or never existed.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    write_failures: Arc<AtomicUsize>,
}

impl EventBus {
    /// Creates a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            write_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Number of cache or analytics write failures published on this bus
    /// or any of its clones.
    #[must_use]
    pub fn write_failures(&self) -> usize {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Publishes an event.
    pub fn publish(&self, event: PipelineEvent) {
        if event.is_write_failure() {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
        if self.tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
