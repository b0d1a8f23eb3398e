//! Retrying session establishment on transient failures.

use super::{Dialect, Session};
use crate::Result;
use std::time::Duration;

/// Exponential backoff settings for [`open_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Builder method to set the attempt count (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Opens a session, retrying only failures classified as connection errors.
///
/// Authentication and unclassified failures are returned immediately, since
/// retrying a bad credential wastes time and may lock the account.
pub async fn open_with_retry(dialect: &dyn Dialect, policy: &RetryPolicy) -> Result<Box<dyn Session>> {
    let mut attempt = 1;
    loop {
        match dialect.open_connection().await {
            Ok(session) => return Ok(session),
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "{} connection attempt {}/{} failed, retrying in {:?}: {}",
                    dialect.warehouse_type(),
                    attempt,
                    policy.max_attempts,
                    delay,
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
