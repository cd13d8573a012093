//! Upload sink error types.

use thiserror::Error;

/// Errors returned by an upload sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UploadError {
    #[error("upload target is not configured")]
    NotConfigured,

    #[error("network error during upload: {message}")]
    Network { message: String },

    #[error("{message}")]
    Rejected { message: String },

    #[error("unexpected upload response: {message}")]
    InvalidResponse { message: String },
}

impl UploadError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns whether a later attempt could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
