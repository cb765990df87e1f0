//! Bounded retry with exponential backoff and jitter.
use std::{future::Future, time::Duration};

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::error::{Result, SyncError};

/// How often, and how patiently, a single operation is retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub initial_delay_ms: u64,
    /// Upper bound on the doubled delay.
    pub max_delay_ms: u64,
    /// Random extra delay in `0..=jitter_ms` added to every wait.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, `max_attempts` times in total.
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    /// Deterministic part of the wait after failed attempt number `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is used up.
///
/// Attempts are strictly sequential. The final failure is returned as
/// [`SyncError::RetryExhausted`] wrapping the last underlying error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= max_attempts => {
                error!(operation, attempt, error = %err, "giving up");
                return Err(SyncError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let delay = policy.backoff(attempt);
                warn!(operation, attempt, error = %err, ?delay, "attempt failed, retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
