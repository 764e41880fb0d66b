//! Checkout service: deadline-bounded units of work with retries.

use std::future::Future;
use std::time::{Duration, Instant};

use common::UserId;
use store::{Store, UnitOfWork};

use crate::committer::{CheckoutReceipt, commit_order};
use crate::error::CheckoutError;
use crate::retry::{RetryPolicy, with_retry};
use crate::snapshot::read_snapshot;
use crate::validator::validate;

/// Default time a checkout may take, retries and backoff included.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Converts a user's cart into an order.
///
/// Each attempt opens a fresh unit of work, reads and locks the cart
/// snapshot, validates it and writes the order. The unit is committed only
/// if every step succeeds; otherwise it is rolled back, or dropped when the
/// deadline expires, and nothing is applied. The deadline covers the whole
/// call, so retries never extend it.
pub struct CheckoutService<S: Store> {
    store: S,
    deadline: Duration,
    retry: RetryPolicy,
}

impl<S: Store> CheckoutService<S> {
    /// Creates a service with the default deadline and retry policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            deadline: DEFAULT_DEADLINE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Checks out the user's cart, retrying retryable storage failures
    /// according to the configured policy.
    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn checkout(&self, user_id: UserId) -> Result<CheckoutReceipt, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = within_deadline(
            self.deadline,
            with_retry(self.retry, |_| self.run(user_id)),
        )
        .await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    total_amount = %receipt.total_amount,
                    "checkout completed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failed_total", "reason" => err.reason()).increment(1);
                tracing::info!(reason = err.reason(), error = %err, "checkout rejected");
            }
        }
        result
    }

    async fn run(&self, user_id: UserId) -> Result<CheckoutReceipt, CheckoutError> {
        let mut tx = self.store.begin().await?;

        match place_order(&mut tx, user_id).await {
            Ok(receipt) => {
                tx.commit().await?;
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "checkout rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Reader → validator → committer inside an open unit of work.
async fn place_order<U: UnitOfWork>(
    tx: &mut U,
    user_id: UserId,
) -> Result<CheckoutReceipt, CheckoutError> {
    let snapshot = read_snapshot(tx, user_id).await?;
    let cart = validate(snapshot)?;
    commit_order(tx, &cart).await
}

/// Runs `work` under `deadline`. On expiry the future is dropped together
/// with any unit of work it holds.
async fn within_deadline<T, Fut>(deadline: Duration, work: Fut) -> Result<T, CheckoutError>
where
    Fut: Future<Output = Result<T, CheckoutError>>,
{
    tokio::time::timeout(deadline, work)
        .await
        .map_err(|_| CheckoutError::Timeout(deadline))?
}
