//! Command line application: wires the services together and runs one command.

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::services::{
    AnalyticsAggregator, BatchOrchestrator, CancellationHandle, DownloadQueue, EventBus,
    ResultCache, RetryExecutor,
};
use crate::application::use_cases::{
    BatchUploadUseCase, ExportResultsUseCase, ProcessArtifactUseCase, ProcessBatchUseCase,
};
use crate::domain::entities::{
    ApiKey, Artifact, BatchItem, BatchProgress, BatchReport, ProcessedResult, ProcessingParameters,
    UploadOptions,
};
use crate::domain::ports::{BlobStorePort, ImageProcessorPort, RecordStorePort};
use crate::infrastructure::config::{AppConfig, Command, ParameterOverrides, StorageManager};
use crate::infrastructure::{FsBlobStore, FsExportTarget, FsRecordStore, HttpUploadSink, read_artifact};
use crate::presentation::report;

/// The composed application.
pub struct App {
    config: AppConfig,
    cache: Arc<ResultCache>,
    analytics: Arc<AnalyticsAggregator>,
    orchestrator: Arc<BatchOrchestrator>,
    pipeline: ProcessArtifactUseCase,
    events: EventBus,
}

impl App {
    /// Opens the stores under `storage` and builds every service.
    ///
    /// # Errors
    /// Returns error if the configured retry policy is invalid.
    pub async fn new(
        config: AppConfig,
        storage: &StorageManager,
        processor: Arc<dyn ImageProcessorPort>,
    ) -> Result<Self> {
        let events = EventBus::default();

        let blob_store: Arc<dyn BlobStorePort> = Arc::new(FsBlobStore::new(storage.results_dir()));
        let record_store: Arc<dyn RecordStorePort> =
            Arc::new(FsRecordStore::new(storage.records_dir()));

        let cache = Arc::new(
            ResultCache::open(blob_store, config.cache.to_cache_config())
                .await
                .with_events(events.clone()),
        );
        let analytics = Arc::new(
            AnalyticsAggregator::open(record_store)
                .await
                .with_events(events.clone()),
        );
        let orchestrator = Arc::new(
            BatchOrchestrator::new(config.batch.max_concurrency).with_events(events.clone()),
        );

        let policy = config
            .retry
            .to_policy()
            .wrap_err("Invalid [retry] configuration")?;
        let pipeline = ProcessArtifactUseCase::new(
            processor,
            cache.clone(),
            analytics.clone(),
            RetryExecutor::new(policy),
        )
        .with_events(events.clone());

        debug!(
            cache = %storage.results_dir().display(),
            records = %storage.records_dir().display(),
            "Services ready"
        );

        Ok(Self {
            config,
            cache,
            analytics,
            orchestrator,
            pipeline,
            events,
        })
    }

    /// Runs one command.
    ///
    /// # Errors
    /// Returns error if the command could not run or some images failed.
    pub async fn run(&self, command: Command) -> Result<()> {
        let failures_before = self.events.write_failures();
        let result = match command {
            Command::Process {
                files,
                overrides,
                output,
            } => self.process(files, &overrides, output).await,
            Command::Upload {
                files,
                overrides,
                title,
                categories,
                tags,
                product_id,
            } => {
                let options = UploadOptions {
                    product_id,
                    title,
                    categories,
                    tags,
                };
                self.upload(files, &overrides, &options).await
            }
            Command::Stats => self.stats().await,
            Command::ClearCache => {
                self.cache.clear_all().await.wrap_err("Failed to clear cache")?;
                println!("Cache cleared");
                Ok(())
            }
            Command::ClearAnalytics => {
                self.analytics
                    .clear()
                    .await
                    .wrap_err("Failed to clear usage statistics")?;
                println!("Usage statistics cleared");
                Ok(())
            }
        };

        let swallowed = self.events.write_failures() - failures_before;
        if swallowed > 0 {
            eprintln!("warning: {swallowed} cache or statistics writes failed, see the log");
        }
        result
    }

    async fn process(
        &self,
        files: Vec<PathBuf>,
        overrides: &ParameterOverrides,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let params = self.parameters(overrides)?;
        let cancellation = CancellationHandle::new();

        let report = self.process_files(files, &params, &cancellation).await?;
        let failed = report.progress.failed_items;
        let results: Vec<ProcessedResult> = report.outputs.into_iter().map(|(_, r)| r).collect();

        let output_dir = output.unwrap_or_else(|| self.config.downloads.output_dir.clone());
        info!(dir = %output_dir.display(), count = results.len(), "Exporting results");
        let (queue, worker) = DownloadQueue::spawn(
            Arc::new(FsExportTarget::new(output_dir)),
            self.config.downloads.stagger(),
        );
        let deliveries = ExportResultsUseCase::new(queue, self.analytics.clone())
            .execute(results)
            .await;
        worker.await.wrap_err("Export worker failed")?;

        print!("{}", report::deliveries(&deliveries));

        let undelivered = deliveries.iter().filter(|d| d.outcome.is_err()).count();
        if failed > 0 || undelivered > 0 {
            bail!("{failed} images failed to process and {undelivered} could not be written");
        }
        Ok(())
    }

    async fn upload(
        &self,
        files: Vec<PathBuf>,
        overrides: &ParameterOverrides,
        options: &UploadOptions,
    ) -> Result<()> {
        let url = self
            .config
            .upload
            .url
            .clone()
            .ok_or_else(|| eyre!("No upload URL configured, set [upload] url or --upload-url"))?;
        let api_key = self
            .config
            .upload
            .api_key
            .clone()
            .and_then(ApiKey::new)
            .ok_or_else(|| eyre!("No upload API key, set IMAGEPRESS_UPLOAD_API_KEY"))?;
        let sink = HttpUploadSink::new(url, api_key).wrap_err("Failed to create upload client")?;

        let params = self.parameters(overrides)?;
        let cancellation = CancellationHandle::new();

        let report = self.process_files(files, &params, &cancellation).await?;
        let results: Vec<ProcessedResult> = report.outputs.into_iter().map(|(_, r)| r).collect();
        if cancellation.is_cancelled() {
            bail!("Cancelled before upload");
        }

        let uploads = BatchUploadUseCase::new(Arc::new(sink), self.orchestrator.clone());
        let summary = self
            .with_progress(
                &cancellation,
                uploads.execute(results, options, &cancellation),
            )
            .await;

        print!("{}", report::upload_summary(&summary));

        if summary.failure_count > 0 || report.progress.failed_items > 0 {
            bail!(
                "{} images failed to process and {} failed to upload",
                report.progress.failed_items,
                summary.failure_count
            );
        }
        Ok(())
    }

    async fn stats(&self) -> Result<()> {
        let usage = self.analytics.usage_stats().await;
        let cache = self.cache.stats().await;
        print!("{}", report::usage_stats(&usage, &cache));
        Ok(())
    }

    fn parameters(&self, overrides: &ParameterOverrides) -> Result<ProcessingParameters> {
        self.config
            .defaults
            .to_parameters(overrides.quality, overrides.max_width, overrides.max_height)
            .wrap_err("Invalid processing parameters")
    }

    /// Reads the files and processes the readable ones as one batch.
    async fn process_files(
        &self,
        files: Vec<PathBuf>,
        params: &ProcessingParameters,
        cancellation: &CancellationHandle,
    ) -> Result<BatchReport<ProcessedResult>> {
        let (items, names) = read_inputs(&files).await;
        if items.is_empty() {
            bail!("None of the {} input files could be read", files.len());
        }

        let batch = ProcessBatchUseCase::new(
            self.pipeline.clone(),
            self.orchestrator.clone(),
            self.analytics.clone(),
        );
        let report = self
            .with_progress(cancellation, batch.execute(items, params, cancellation))
            .await;

        print!("{}", report::batch_report(&report, &names));
        Ok(report)
    }

    /// Runs `work` while printing batch progress and cancelling on Ctrl-C.
    async fn with_progress<T>(
        &self,
        cancellation: &CancellationHandle,
        work: impl Future<Output = T>,
    ) -> T {
        let signal = spawn_cancel_on_ctrl_c(cancellation.clone());
        let printer = spawn_progress_printer(self.orchestrator.subscribe_progress());

        let output = work.await;

        signal.abort();
        printer.abort();
        output
    }
}

/// Reads every file. Unreadable files are reported and left out, names are
/// indexed like the returned items.
async fn read_inputs(files: &[PathBuf]) -> (Vec<BatchItem<Artifact>>, Vec<String>) {
    let mut items = Vec::with_capacity(files.len());
    let mut names = Vec::with_capacity(files.len());

    for path in files {
        match read_artifact(path).await {
            Ok(artifact) => {
                names.push(artifact.name().to_string());
                items.push(BatchItem::selected(artifact));
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable input");
                eprintln!("skipping {e}");
            }
        }
    }

    (items, names)
}

fn spawn_cancel_on_ctrl_c(cancellation: CancellationHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received Ctrl+C, cancelling batch");
            eprintln!("Cancelling, waiting for images in progress...");
            cancellation.cancel();
        }
    })
}

fn spawn_progress_printer(mut progress_rx: watch::Receiver<BatchProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            if progress.total_items > 0 {
                eprintln!("{}", report::progress_line(&progress));
            }
        }
    })
}
