//! Backoff retry for transient write failures
//!
//! Index ingestion retries a failed write once before logging and giving up;
//! [`RetryPolicy::once`] captures that policy.
//!
//! # Examples
//!
//! ```
//! use novel_hub_core::retry::{retry_with_backoff, RetryPolicy};
//!
//! # async fn example() {
//! let result: Result<&str, &str> = retry_with_backoff(
//!     || async { Ok("indexed") },
//!     RetryPolicy::once(),
//!     |_| true,
//! )
//! .await;
//! assert_eq!(result, Ok("indexed"));
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (0 means a single attempt)
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// One retry after a short pause
    pub fn once() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 50,
            max_delay_ms: 50,
        }
    }

    /// `min(base * 2^attempt, max)`
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }
}

/// Runs `operation`, retrying per `policy` while `is_retryable` accepts the error
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    policy: RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= policy.max_retries {
                    tracing::warn!(
                        attempt,
                        max_retries = policy.max_retries,
                        "All retry attempts exhausted"
                    );
                    return Err(error);
                }
                if !is_retryable(&error) {
                    tracing::debug!(attempt, "Error is not retryable, failing immediately");
                    return Err(error);
                }

                let delay = policy.calculate_delay(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after delay"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
