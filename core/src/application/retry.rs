//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Error;

/// All attempts failed.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryError {
    pub attempts: u32,
    #[source]
    pub last_error: Error,
}

/// How often and how patiently to repeat a failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Same delay, different attempt budget.
    pub fn with_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && error.is_transient() => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %error, "Attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!(attempt, error = %error, "Giving up");
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: error,
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}
