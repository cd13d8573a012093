//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{
    AppConfig, BatchConfig, CacheConfig, DefaultsConfig, DownloadsConfig, LogLevel, RetryConfig,
    UploadConfig,
};
pub use args::{CliArgs, Command, ParameterOverrides};
pub use storage::{ConfigError, StorageManager};
