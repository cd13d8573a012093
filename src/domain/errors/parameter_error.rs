//! Validation errors for immutable request configuration.

use thiserror::Error;

/// Invalid processing parameters or retry policy.
#[derive(Debug, Clone, Error, PartialEq)]
#[allow(missing_docs)]
pub enum ParameterError {
    #[error("compression level must be within 1..=100, got {level}")]
    CompressionLevelOutOfRange { level: u32 },

    #[error("retry policy needs at least one attempt")]
    NoAttempts,

    #[error("backoff factor must be a finite number >= 1.0, got {factor}")]
    InvalidBackoffFactor { factor: f64 },
}
