//! Retry logic.
//!
//! # Responsibilities
//! - Run one logical operation as up to `max_attempts` sequential attempts
//! - Sleep with exponential backoff between attempts
//! - Report every failed attempt to the caller's hook
//!
//! # Design Decisions
//! - Every failure consumes an attempt, including breaker rejections; the
//!   policy does not know or care why an attempt failed
//! - Backoff suspends only the calling task
//! - Exhaustion is terminal and carries the last underlying error

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// All attempts failed.
#[derive(Debug, Error)]
#[error("all {attempts} attempts failed, last error: {last}")]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    #[source]
    pub last: E,
}

/// A value produced by a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-based index of the attempt that succeeded.
    pub attempts: u32,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_timeout: Duration,
    factor: f64,
    max_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_timeout: Duration, factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_timeout,
            factor,
            max_timeout: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_timeout: config.max_timeout_ms.map(Duration::from_millis),
            ..Self::new(
                config.max_attempts,
                Duration::from_millis(config.min_timeout_ms),
                config.factor,
            )
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempt `attempt` and the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.min_timeout, self.factor, self.max_timeout)
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-based attempt index. `on_failure` is called once
    /// per failed attempt, including the last, before any backoff sleep.
    pub async fn run<T, E, F, Fut, L>(&self, mut op: F, mut on_failure: L) -> Result<Attempted<T>, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        L: FnMut(u32, &E),
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    })
                }
                Err(e) => {
                    on_failure(attempt, &e);
                    if attempt >= self.max_attempts {
                        return Err(RetryExhausted { attempts: attempt, last: e });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before next attempt"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
