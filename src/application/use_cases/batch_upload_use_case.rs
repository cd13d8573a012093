//! Uploads processed results to the configured sink.

use std::sync::Arc;

use tracing::info;

use crate::application::services::{BatchOrchestrator, CancellationHandle};
use crate::domain::entities::{BatchItem, ProcessedResult, UploadOptions, UploadSummary};
use crate::domain::ports::UploadSinkPort;

/// Uploads a batch, isolating per-item failures.
#[derive(Clone)]
pub struct BatchUploadUseCase {
    sink: Arc<dyn UploadSinkPort>,
    orchestrator: Arc<BatchOrchestrator>,
}

impl BatchUploadUseCase {
    /// Creates the use case.
    #[must_use]
    pub const fn new(sink: Arc<dyn UploadSinkPort>, orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self { sink, orchestrator }
    }

    /// Uploads every result with the same options.
    pub async fn execute(
        &self,
        results: Vec<ProcessedResult>,
        options: &UploadOptions,
        cancellation: &CancellationHandle,
    ) -> UploadSummary {
        let names: Vec<String> = results.iter().map(|r| r.derived_filename.clone()).collect();
        let items = results.into_iter().map(BatchItem::selected).collect();
        let sink = &self.sink;

        let report = self
            .orchestrator
            .run_batch(
                items,
                move |_, result: ProcessedResult| async move {
                    sink.upload(&result, options).await
                },
                cancellation,
            )
            .await;

        let summary = UploadSummary {
            success_count: report.progress.succeeded_items,
            failure_count: report.progress.failed_items,
            errors: report
                .failures
                .iter()
                .map(|f| format!("{}: {}", names[f.index], f.message))
                .collect(),
            urls: report.outputs.into_iter().map(|(_, receipt)| receipt.url).collect(),
        };

        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            "Upload batch finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UploadReceipt;
    use crate::domain::errors::UploadError;
    use crate::domain::ports::mocks::MockUploadSinkPort;
    use bytes::Bytes;

    fn result(name: &str) -> ProcessedResult {
        ProcessedResult {
            source_name: name.to_string(),
            derived_filename: name.to_string(),
            bytes: Bytes::from_static(b"jpeg"),
            original_size: 8,
            attempts: 1,
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn test_partial_failure_summary() {
        let mut sink = MockUploadSinkPort::new();
        sink.expect_upload().times(3).returning(|result, _| {
            if result.derived_filename == "b.jpg" {
                Err(UploadError::rejected("Upload failed"))
            } else {
                Ok(UploadReceipt {
                    url: format!("https://cdn.example.com/{}", result.derived_filename),
                })
            }
        });
        let use_case =
            BatchUploadUseCase::new(Arc::new(sink), Arc::new(BatchOrchestrator::new(1)));

        let summary = use_case
            .execute(
                vec![result("a.jpg"), result("b.jpg"), result("c.jpg")],
                &UploadOptions::default(),
                &CancellationHandle::new(),
            )
            .await;

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.errors, vec!["b.jpg: Upload failed".to_string()]);
        assert_eq!(
            summary.urls,
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/c.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_options_are_forwarded() {
        let mut sink = MockUploadSinkPort::new();
        sink.expect_upload()
            .withf(|_, options| options.title.as_deref() == Some("Vintage lamp"))
            .times(1)
            .returning(|_, _| {
                Ok(UploadReceipt {
                    url: "https://cdn.example.com/x.jpg".to_string(),
                })
            });
        let use_case = BatchUploadUseCase::new(Arc::new(sink), Arc::new(BatchOrchestrator::default()));
        let options = UploadOptions {
            title: Some("Vintage lamp".to_string()),
            ..UploadOptions::default()
        };

        let summary = use_case
            .execute(vec![result("x.jpg")], &options, &CancellationHandle::new())
            .await;

        assert_eq!(summary.success_count, 1);
        assert!(summary.errors.is_empty());
    }
}
