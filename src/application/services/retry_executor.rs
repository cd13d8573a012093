//! Exponential backoff around fallible async operations.

use std::future::Future;

use tracing::debug;

use crate::domain::entities::RetryPolicy;
use crate::domain::errors::RetryError;

/// Successful result together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// Value produced by the successful attempt.
    pub value: T,
    /// One-based number of the successful attempt.
    pub attempts: u32,
}

/// Re-runs an operation until it succeeds or the policy is exhausted.
///
/// Backoff delays use `tokio::time::sleep`, so waiting never stalls the runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates an executor with the given policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` with retries.
    ///
    /// # Errors
    /// Returns `RetryError::Exhausted` carrying the last attempt's error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_callback(operation, |_, _| {}).await
    }

    /// Runs `operation` with retries, calling `on_retry` with the one-based
    /// number of each failed attempt that will be retried.
    ///
    /// The final failure does not trigger the callback and is not followed by
    /// a delay.
    ///
    /// # Errors
    /// Returns `RetryError::Exhausted` carrying the last attempt's error.
    pub async fn execute_with_callback<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        mut on_retry: C,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(u32, &E),
        E: std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt_index = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt_index + 1,
                    });
                }
                Err(e) if attempt_index + 1 >= max_attempts => {
                    debug!(attempts = max_attempts, error = %e, "Giving up after final attempt");
                    return Err(RetryError::Exhausted {
                        attempts: max_attempts,
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt_index);
                    debug!(
                        attempt = attempt_index + 1,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    on_retry(attempt_index + 1, &e);
                    tokio::time::sleep(delay).await;
                    attempt_index += 1;
                }
            }
        }
    }
}
