use std::future::Future;
use std::time::Duration;

use crate::error::{HistoryError, Result};

/// Bounded, fixed-interval retry for indexer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            interval: Duration::from_millis(1000),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error or runs out
/// of attempts. Exhaustion surfaces as [`HistoryError::Indexer`].
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    query = label,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Indexer query failed, retrying in {:?}",
                    policy.interval
                );
                tokio::time::sleep(policy.interval).await;
            }
            Err(e) => {
                return Err(HistoryError::Indexer(format!(
                    "{label} query failed after {attempt} attempt(s): {e}"
                )))
            }
        }
    }
}
