//! Retry configuration.

use std::time::Duration;

use serde::Serialize;

use crate::domain::errors::ParameterError;

/// Default number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default exponential growth of the delay.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;

/// Exponential backoff policy. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay_ms: u64,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Creates a validated policy.
    ///
    /// # Errors
    /// Returns error if `max_attempts` is zero or `backoff_factor` is below 1.0 or not finite.
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        backoff_factor: f64,
    ) -> Result<Self, ParameterError> {
        if max_attempts == 0 {
            return Err(ParameterError::NoAttempts);
        }
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(ParameterError::InvalidBackoffFactor {
                factor: backoff_factor,
            });
        }

        Ok(Self {
            max_attempts,
            initial_delay_ms,
            backoff_factor,
        })
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            backoff_factor: 1.0,
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the initial delay in milliseconds.
    #[must_use]
    pub const fn initial_delay_ms(&self) -> u64 {
        self.initial_delay_ms
    }

    /// Returns the backoff factor.
    #[must_use]
    pub const fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Delay to wait after the failed attempt with the given zero-based index.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let exponent = attempt_index.min(i32::MAX as u32) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        if !millis.is_finite() || millis >= u64::MAX as f64 {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}
