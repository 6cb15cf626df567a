//! Connection retry with optional exponential backoff.

use std::{future::Future, time::Duration};

use tracing::{error, info, warn};

/// Retries establishing a connection a bounded number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error
    Exhausted { attempts: u32, last: E },
    /// The operation failed in a way retrying cannot fix
    Fatal(E),
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based):
    /// `min(base_delay * 2^(attempt-1), max_delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 2u64.saturating_pow(exponent);
        let delay = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay.as_millis() as u64))
    }

    /// Run `op` until it succeeds, `is_retryable` rejects its error, or the
    /// attempts are used up.
    pub async fn run<F, Fut, T, E>(
        &self,
        endpoint: &str,
        mut op: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(endpoint, attempt, "Connected after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
                Err(e) if attempt >= max_attempts => {
                    error!(endpoint, attempts = attempt, error = %e, "Giving up connecting");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Connection attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
