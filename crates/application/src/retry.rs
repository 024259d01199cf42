//! Bounded exponential backoff for throttled calls.

use std::future::Future;
use std::time::Duration;

use kustforge_domain::ResolveError;
use rand::Rng;
use tracing::warn;

/// Retry budget for throttling errors. Every other error is returned on the
/// first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` counts the first call, so `3` means
    /// up to two retries.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier: multiplier.max(1.0),
            jitter: true,
        }
    }

    /// Disables random jitter, making delays deterministic.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Total attempts allowed, first call included.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), capped at the max delay.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        let scaled = if self.jitter {
            capped * rand::rng().random_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::from_secs_f64(scaled)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The closure receives the 1-based
    /// attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error. An exhausted `Throttling` error reports the
    /// number of attempts actually made.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ResolveError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "throttled, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ResolveError::Throttling { service, cause, .. }) => {
                    return Err(ResolveError::Throttling {
                        service,
                        attempts: attempt,
                        cause,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
