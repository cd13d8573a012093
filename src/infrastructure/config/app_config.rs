//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::{
    DEFAULT_MAX_AGE_DAYS, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_BYTES,
    ResultCacheConfig,
};
use crate::domain::entities::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_COMPRESSION_LEVEL, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL_NAME, ProcessingParameters, RetryPolicy,
};
use crate::domain::errors::ParameterError;

use super::args::CliArgs;

pub(super) const APP_NAME: &str = "imagepress";
pub(super) const APP_QUALIFIER: &str = "com";
pub(super) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Overrides the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Overrides the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry settings for the processing function.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Export settings.
    #[serde(default)]
    pub downloads: DownloadsConfig,

    /// Upload sink settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Default processing parameters.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries kept before the oldest are evicted.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries older than this are treated as missing. `0` disables expiry.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// Oldest entries are evicted while payloads sum to more than this. `0` disables the limit.
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,

    /// Refresh the stored time on every hit.
    #[serde(default = "default_true")]
    pub touch_on_hit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            touch_on_hit: true,
        }
    }
}

impl CacheConfig {
    /// Builds the cache configuration.
    #[must_use]
    pub fn to_cache_config(&self) -> ResultCacheConfig {
        ResultCacheConfig {
            max_entries: self.max_entries,
            max_age: (self.max_age_days > 0).then(|| chrono::Duration::days(self.max_age_days)),
            max_total_bytes: (self.max_total_bytes > 0).then_some(self.max_total_bytes),
            touch_on_hit: self.touch_on_hit,
            ..ResultCacheConfig::default()
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per item, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth of the delay per attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Builds the retry policy.
    ///
    /// # Errors
    /// Returns error if the configured values are invalid.
    pub fn to_policy(&self) -> Result<RetryPolicy, ParameterError> {
        RetryPolicy::new(self.max_attempts, self.initial_delay_ms, self.backoff_factor)
    }
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items processed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// `[downloads]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Pause between two exported files.
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,

    /// Directory exported files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            stagger_ms: default_stagger_ms(),
            output_dir: default_output_dir(),
        }
    }
}

impl DownloadsConfig {
    /// Returns the stagger as a duration.
    #[must_use]
    pub const fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// `[upload]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Endpoint receiving the multipart upload.
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as a bearer token.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// JPEG quality, 1 to 100.
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Bounding box width. `0` is unbounded.
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Bounding box height. `0` is unbounded.
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Remove the background before compressing.
    #[serde(default)]
    pub background_removal: bool,

    /// Background removal model.
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_width: default_max_width(),
            max_height: default_max_height(),
            background_removal: false,
            model_name: default_model_name(),
        }
    }
}

impl DefaultsConfig {
    /// Builds processing parameters, with optional per-run overrides.
    ///
    /// # Errors
    /// Returns error if the compression level is out of range.
    pub fn to_parameters(
        &self,
        quality: Option<u32>,
        max_width: Option<u32>,
        max_height: Option<u32>,
    ) -> Result<ProcessingParameters, ParameterError> {
        let params = ProcessingParameters::new(quality.unwrap_or(self.compression_level))?
            .with_max_dimensions(
                max_width.unwrap_or(self.max_width),
                max_height.unwrap_or(self.max_height),
            );

        Ok(if self.background_removal {
            params.with_background_removal(self.model_name.clone())
        } else {
            params.with_model_name(self.model_name.clone())
        })
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

const fn default_max_age_days() -> i64 {
    DEFAULT_MAX_AGE_DAYS
}

const fn default_max_total_bytes() -> u64 {
    DEFAULT_MAX_TOTAL_BYTES
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}

const fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

const fn default_stagger_ms() -> u64 {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("imagepress-output")
}

const fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

const fn default_max_width() -> u32 {
    1920
}

const fn default_max_height() -> u32 {
    1080
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(data_dir) = &args.data_dir {
            self.data_dir = Some(data_dir.clone());
        }
        if let Some(api_key) = &args.upload_api_key {
            self.upload.api_key = Some(api_key.clone());
        }
        if let Some(upload_url) = &args.upload_url {
            self.upload.url = Some(upload_url.clone());
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("imagepress.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            cache_dir: None,
            data_dir: None,
            log_level: LogLevel::Info,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            downloads: DownloadsConfig::default(),
            upload: UploadConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [cache]
            max_entries = 10

            [retry]
            backoff_factor = 2.0

            [downloads]
            output_dir = "/tmp/out"

            [defaults]
            compression_level = 65
            background_removal = true
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.max_age_days, DEFAULT_MAX_AGE_DAYS);
        assert_eq!(config.cache.max_total_bytes, DEFAULT_MAX_TOTAL_BYTES);
        assert!(config.cache.touch_on_hit);
        assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!((config.retry.backoff_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.downloads.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.downloads.stagger_ms, 100);
        assert_eq!(config.defaults.compression_level, 65);
        assert!(config.defaults.background_removal);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.batch.max_concurrency, 3);
        assert_eq!(config.defaults.max_width, 1920);
        assert_eq!(config.defaults.max_height, 1080);
        assert_eq!(config.defaults.model_name, "u2net");
        assert!(config.upload.url.is_none());
        assert!(config.retry.to_policy().is_ok());
    }

    #[test]
    fn test_zero_max_age_disables_expiry() {
        let cache = CacheConfig {
            max_age_days: 0,
            ..CacheConfig::default()
        };
        assert!(cache.to_cache_config().max_age.is_none());
        assert_eq!(
            CacheConfig::default().to_cache_config().max_age,
            Some(chrono::Duration::days(7))
        );
    }

    #[test]
    fn test_cache_byte_limit() {
        let config: AppConfig = toml::from_str("[cache]\nmax_total_bytes = 4096\n").unwrap();
        assert_eq!(config.cache.to_cache_config().max_total_bytes, Some(4096));

        assert_eq!(
            CacheConfig::default().to_cache_config().max_total_bytes,
            Some(100 * 1024 * 1024)
        );
        let unlimited = CacheConfig {
            max_total_bytes: 0,
            ..CacheConfig::default()
        };
        assert!(unlimited.to_cache_config().max_total_bytes.is_none());
    }

    #[test]
    fn test_parameter_overrides() {
        let defaults = DefaultsConfig::default();

        let params = defaults.to_parameters(Some(55), None, Some(0)).unwrap();
        assert_eq!(params.compression_level(), 55);
        assert_eq!(params.max_width(), 1920);
        assert_eq!(params.max_height(), 0);
        assert!(!params.background_removal());

        assert!(defaults.to_parameters(Some(0), None, None).is_err());
    }

    #[test]
    fn test_invalid_retry_config() {
        let retry = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(retry.to_policy().is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "imagepress",
            "--log-level",
            "trace",
            "--cache-dir",
            "/tmp/cache",
            "--upload-api-key",
            "from-flag",
            "stats",
        ]);
        let mut config = AppConfig::default();
        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(config.upload.api_key.as_deref(), Some("from-flag"));
        assert!(config.data_dir.is_none());
    }
}
