//! Retry policy for checkouts that lose a lock or serialization race.

use std::future::Future;
use std::time::Duration;

use crate::error::CheckoutError;

/// How many times to attempt a checkout and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts.
///
/// `attempt` receives the 1-based attempt number and must start from a
/// fresh unit of work each time.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, CheckoutError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CheckoutError>>,
{
    let mut current = 1;
    loop {
        match attempt(current).await {
            Err(err) if err.is_retryable() && current < policy.max_attempts => {
                tracing::warn!(attempt = current, error = %err, "checkout attempt failed, retrying");
                metrics::counter!("checkout_retries_total").increment(1);
                tokio::time::sleep(policy.delay_after(current)).await;
                current += 1;
            }
            result => return result,
        }
    }
}
