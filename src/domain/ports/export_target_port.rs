//! Port for delivering processed results to the user.

use async_trait::async_trait;

use crate::domain::entities::ProcessedResult;
use crate::domain::errors::StoreResult;

/// Destination of downloaded results.
#[async_trait]
pub trait ExportTargetPort: Send + Sync {
    /// Delivers one result and returns where it ended up.
    async fn deliver(&self, result: &ProcessedResult) -> StoreResult<String>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::errors::StoreError;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use tokio::time::Instant;

    /// Target that remembers what it received and when.
    #[derive(Default)]
    pub struct RecordingExportTarget {
        failing: HashSet<String>,
        delivered: Mutex<Vec<(String, Instant)>>,
    }

    impl RecordingExportTarget {
        /// Creates a target that accepts everything.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes deliveries of `derived_filename` fail.
        #[must_use]
        pub fn failing_for(mut self, derived_filename: &str) -> Self {
            self.failing.insert(derived_filename.to_string());
            self
        }

        /// Returns accepted file names with their delivery time, in order.
        pub fn delivered(&self) -> Vec<(String, Instant)> {
            self.delivered.lock().clone()
        }
    }

    #[async_trait]
    impl ExportTargetPort for RecordingExportTarget {
        async fn deliver(&self, result: &ProcessedResult) -> StoreResult<String> {
            if self.failing.contains(&result.derived_filename) {
                return Err(StoreError::io("simulated disk full"));
            }
            self.delivered
                .lock()
                .push((result.derived_filename.clone(), Instant::now()));
            Ok(format!("exports/{}", result.derived_filename))
        }
    }
}
