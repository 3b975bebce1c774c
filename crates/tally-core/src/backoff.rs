//! Linear retry policy.
//!
//! Attempt `n` (0-based) that fails is followed by a wait of
//! `base + step * n`; with the defaults that is 1s, 3s, 5s, ... The policy
//! gives up after `max_attempts` calls in total.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Bounded linear backoff shared by the agent reporter and database startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total number of calls, including the first one.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub base: Duration,
    /// Extra wait added per subsequent failure.
    pub step: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            step: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// A policy that retries without sleeping (for tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base: Duration::ZERO,
            step: Duration::ZERO,
        }
    }

    /// Wait after the failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base + self.step * attempt
    }

    /// Run `op` until it succeeds, `retryable` rejects the error, or the
    /// attempt ceiling is reached. The last error is returned.
    pub async fn retry<T, E, F, Fut>(
        &self,
        what: &str,
        mut op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => {
                    if attempt > 0 {
                        debug!(what, attempt = attempt + 1, "succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(e) if attempt + 1 < attempts && retryable(&e) => {
                    let wait = self.delay(attempt);
                    warn!(
                        what,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
