//! Bounded retry with classification-driven termination.
//!
//! Errors classify themselves through the [`Retryable`] trait:
//!
//! | Class | Retried? |
//! |-------|----------|
//! | `Transient` | Yes, up to the attempt budget |
//! | `Terminal` | No - the request is fundamentally invalid or exhausted |
//! | `CircuitOpen` | No - the breaker already decided; retrying would defeat it |
//!
//! An open-circuit rejection must propagate immediately without consuming
//! retry budget: it is a fast-fail signal to back off entirely, not a
//! transient remote failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

/// Classification of an error for retry purposes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient remote failure (timeout, 5xx, transport) - retry.
    Transient,
    /// Terminal failure - retrying won't help.
    Terminal,
    /// The circuit breaker rejected the call - never retried.
    CircuitOpen,
}

/// Trait for errors that know their own retry classification.
pub trait Retryable {
    /// Returns the retry classification for this error.
    fn retry_class(&self) -> RetryClass;
}

/// Retry configuration.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first (so 3 means 2 retries).
    pub max_attempts: u32,
    /// Delay between attempts (constant backoff).
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Executes an operation with bounded retries and constant backoff.
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// Returns the first success, or the last observed error once the
    /// attempt budget is exhausted. Terminal and circuit-open errors are
    /// returned immediately without sleeping or consuming further attempts.
    pub async fn execute<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Retry: '{}' succeeded on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => match err.retry_class() {
                    RetryClass::Transient if attempt < max_attempts => {
                        warn!(
                            "Retry: '{}' attempt {}/{} failed: {}, retrying in {:?}",
                            name, attempt, max_attempts, err, self.config.base_delay
                        );
                        tokio::time::sleep(self.config.base_delay).await;
                    }
                    RetryClass::Transient => {
                        warn!(
                            "Retry: '{}' exhausted {} attempts, last error: {}",
                            name, max_attempts, err
                        );
                        return Err(err);
                    }
                    RetryClass::Terminal => {
                        debug!("Retry: '{}' terminal error on attempt {}: {}", name, attempt, err);
                        return Err(err);
                    }
                    RetryClass::CircuitOpen => {
                        debug!("Retry: '{}' circuit open, not retrying", name);
                        return Err(err);
                    }
                },
            }
        }

        unreachable!("retry loop returns from every branch")
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
