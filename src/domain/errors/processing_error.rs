//! Errors from the external processing function and the retry loop around it.

use thiserror::Error;

/// Failure reported by an image processor. Every variant is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ProcessingError {
    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("failed to encode image: {message}")]
    Encode { message: String },

    #[error("unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("processing failed: {message}")]
    Failed { message: String },
}

impl ProcessingError {
    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates unsupported error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a generic failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Error returned once a retried operation has used up its attempts.
///
/// Only the error of the final attempt is kept.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// All attempts failed.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the last attempt.
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Returns the number of attempts that were made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Returns the error from the last attempt.
    #[must_use]
    pub const fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Consumes the error and returns the last attempt's error.
    #[must_use]
    pub fn into_last_error(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Errors surfaced by the cached processing pipeline.
///
/// Cache and analytics failures never appear here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The processor failed on every attempt.
    #[error("{source}")]
    ExhaustedRetries {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: ProcessingError,
    },
}

impl PipelineError {
    /// Returns the underlying processing error.
    #[must_use]
    pub const fn processing_error(&self) -> &ProcessingError {
        match self {
            Self::ExhaustedRetries { source, .. } => source,
        }
    }
}

impl From<RetryError<ProcessingError>> for PipelineError {
    fn from(e: RetryError<ProcessingError>) -> Self {
        let attempts = e.attempts();
        Self::ExhaustedRetries {
            attempts,
            source: e.into_last_error(),
        }
    }
}
