//! Bounded retry for provider requests.
//!
//! A fixed number of attempts with a delay that grows linearly with the
//! attempt number. Only transient failures (network, timeouts, 5xx, rate
//! limits) are retried; anything else fails on the spot. This is the only
//! retry layer between the loop and a backend.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;

/// Retry policy for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy, clamping `max_attempts` to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Classifies an HTTP status from a model backend as transient.
///
/// Request timeouts, conflicts, rate limiting and every 5xx are worth
/// another attempt; any other status will fail the same way again.
#[must_use]
pub const fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429 | 500..=599)
}

/// Runs `operation` under `policy`.
///
/// # Errors
///
/// Returns [`ProviderError::Failed`] wrapping the last per-attempt error when
/// attempts run out or the error is not transient.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    provider: &'static str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    provider,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "provider request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(ProviderError::Failed {
                    provider,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
        }
    }
}
