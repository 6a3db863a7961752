//! Retry policy and executor

use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts; the caller's deadline may end the retries
    /// earlier
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy used while waiting for a freshly deployed endpoint to serve.
    ///
    /// Starts fast and settles at a few seconds between checks. Attempts are
    /// unbounded, so only the caller's deadline ends the wait.
    pub fn readiness() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_strategy: BackoffStrategy::Exponential { base: 1.5 },
            jitter: true,
        }
    }

    /// Create a linear retry policy
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay.saturating_mul(max_attempts),
            backoff_strategy: BackoffStrategy::Linear,
            jitter: false,
        }
    }

    fn calculator(&self) -> BackoffCalculator {
        BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        )
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether this error is retryable
    fn is_retryable(&self) -> bool;
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Retry until the operation succeeds, `policy.max_attempts` attempts
    /// have failed, or `deadline` has elapsed.
    ///
    /// Each attempt is itself cut off at the deadline, so a hanging attempt
    /// cannot outlive it.
    pub async fn execute_until<F, Fut, T, E>(
        &self,
        deadline: Duration,
        mut f: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let calculator = self.policy.calculator();
        let started = Instant::now();
        let mut attempt = 1;
        let mut last_error = None;

        loop {
            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    "Gave up after {} attempts over {:?}",
                    attempt - 1,
                    started.elapsed()
                );
                return Err(RetryError::DeadlineExceeded {
                    attempts: attempt - 1,
                    waited: started.elapsed(),
                    last_error,
                });
            }

            match tokio::time::timeout(remaining, f(attempt)).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        info!(
                            "Operation succeeded after {} attempts in {:?}",
                            attempt,
                            started.elapsed()
                        );
                    }
                    return Ok(result);
                }
                Ok(Err(error)) => {
                    if !error.is_retryable() {
                        warn!("Operation failed with non-retryable error: {}", error);
                        return Err(RetryError::NonRetryableError(error));
                    }

                    if attempt >= self.policy.max_attempts {
                        warn!(
                            "Gave up after {} attempts over {:?}: {}",
                            attempt,
                            started.elapsed(),
                            error
                        );
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let remaining = deadline.saturating_sub(started.elapsed());
                    let delay = calculator.delay_within(attempt, remaining);
                    debug!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, error, delay
                    );
                    last_error = Some(error);
                    sleep(delay).await;
                }
                Err(_) => {
                    debug!("Attempt {} did not finish before the deadline", attempt);
                }
            }

            attempt += 1;
        }
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Deadline elapsed before any attempt succeeded
    #[error("Deadline exceeded after {attempts} attempts ({waited:?})")]
    DeadlineExceeded {
        attempts: u32,
        waited: Duration,
        last_error: Option<E>,
    },

    /// Non-retryable error encountered
    #[error("Non-retryable error: {0}")]
    NonRetryableError(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct TestError {
        retryable: bool,
        message: String,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fixed_policy(max_attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(delay_ms),
            max_delay: Duration::from_millis(delay_ms * 10),
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_until_stops_at_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryPolicy::linear(3, Duration::from_millis(20)));

        let result: Result<(), RetryError<TestError>> = executor
            .execute_until(Duration::from_secs(60), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(TestError {
                        retryable: true,
                        message: format!("503 on attempt {}", attempt),
                    })
                }
            })
            .await;

        match result.unwrap_err() {
            RetryError::MaxAttemptsExceeded {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.message, "503 on attempt 3");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let executor = RetryExecutor::new(RetryPolicy::readiness());

        let result: Result<(), RetryError<TestError>> = executor
            .execute_until(Duration::from_secs(5), |_| async {
                Err(TestError {
                    retryable: false,
                    message: "Non-retryable".to_string(),
                })
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            RetryError::NonRetryableError(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_until_succeeds_before_deadline() {
        let executor = RetryExecutor::new(fixed_policy(10, 100));

        let result = executor
            .execute_until(Duration::from_secs(5), |attempt| async move {
                if attempt < 4 {
                    Err(TestError {
                        retryable: true,
                        message: format!("attempt {}", attempt),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_until_reports_deadline_with_last_error() {
        let executor = RetryExecutor::new(fixed_policy(u32::MAX, 200));

        let result: Result<(), RetryError<TestError>> = executor
            .execute_until(Duration::from_secs(1), |attempt| async move {
                Err(TestError {
                    retryable: true,
                    message: format!("not ready ({})", attempt),
                })
            })
            .await;

        match result.unwrap_err() {
            RetryError::DeadlineExceeded {
                attempts,
                waited,
                last_error,
            } => {
                assert!(attempts >= 5);
                assert!(waited >= Duration::from_secs(1));
                assert!(last_error.unwrap().message.starts_with("not ready"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_until_cuts_off_hanging_attempt() {
        let executor = RetryExecutor::new(fixed_policy(u32::MAX, 10));

        let result: Result<(), RetryError<TestError>> = executor
            .execute_until(Duration::from_millis(500), |_| async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            RetryError::DeadlineExceeded { .. }
        ));
    }
}
