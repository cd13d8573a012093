//! Staggered delivery of processed results.
//!
//! A single worker drains a FIFO of delivery jobs and waits a fixed interval
//! between consecutive deliveries, so export order and spacing are
//! deterministic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::entities::ProcessedResult;
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::ExportTargetPort;

/// Default interval between deliveries.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(100);

/// Outcome of delivering one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// File name that was delivered.
    pub derived_filename: String,
    /// Where the result ended up, or why it could not be delivered.
    pub outcome: StoreResult<String>,
}

struct DeliveryJob {
    result: ProcessedResult,
    reply: oneshot::Sender<Delivery>,
}

/// Handle to the delivery worker. Dropping every handle stops the worker
/// once queued jobs are done.
#[derive(Clone)]
pub struct DownloadQueue {
    job_tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl DownloadQueue {
    /// Spawns the worker and returns a handle to it.
    #[must_use]
    pub fn spawn(target: Arc<dyn ExportTargetPort>, stagger: Duration) -> (Self, JoinHandle<()>) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let worker = DeliveryWorker {
            target,
            stagger,
            job_rx,
        };
        (Self { job_tx }, tokio::spawn(worker.run()))
    }

    /// Queues results for delivery and waits for all of them.
    ///
    /// Deliveries are reported in input order. A failed delivery does not
    /// affect the others.
    pub async fn enqueue(&self, results: Vec<ProcessedResult>) -> Vec<Delivery> {
        let mut pending = Vec::with_capacity(results.len());

        for result in results {
            let derived_filename = result.derived_filename.clone();
            let (reply, reply_rx) = oneshot::channel();
            if self.job_tx.send(DeliveryJob { result, reply }).is_err() {
                warn!(file = %derived_filename, "Delivery worker is gone");
            }
            pending.push((derived_filename, reply_rx));
        }

        let mut deliveries = Vec::with_capacity(pending.len());
        for (derived_filename, reply_rx) in pending {
            let delivery = reply_rx.await.unwrap_or_else(|_| Delivery {
                outcome: Err(StoreError::io("delivery worker stopped")),
                derived_filename,
            });
            deliveries.push(delivery);
        }
        deliveries
    }
}

struct DeliveryWorker {
    target: Arc<dyn ExportTargetPort>,
    stagger: Duration,
    job_rx: mpsc::UnboundedReceiver<DeliveryJob>,
}

impl DeliveryWorker {
    async fn run(mut self) {
        debug!(stagger_ms = self.stagger.as_millis(), "Delivery worker started");
        let mut last_delivery: Option<Instant> = None;

        while let Some(job) = self.job_rx.recv().await {
            if let Some(last) = last_delivery {
                tokio::time::sleep_until(last + self.stagger).await;
            }
            last_delivery = Some(Instant::now());

            let outcome = self.target.deliver(&job.result).await;
            match &outcome {
                Ok(location) => info!(file = %job.result.derived_filename, location = %location, "Delivered result"),
                Err(e) => warn!(file = %job.result.derived_filename, error = %e, "Failed to deliver result"),
            }

            let _ = job.reply.send(Delivery {
                derived_filename: job.result.derived_filename,
                outcome,
            });
        }

        debug!("Delivery worker stopped");
    }
}
