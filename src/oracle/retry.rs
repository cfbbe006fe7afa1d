//! Timeout, retry and backoff for external calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::pipeline::CancelSignal;

/// How external calls are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per key, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Backoff multiplier (e.g. 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Cap for exponential growth.
    pub max_backoff: Duration,
    /// Deadline for a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// `min(initial_backoff * multiplier^(attempt-1), max_backoff)`
    ///
    /// # Example
    ///
    /// ```
    /// use meal_benefit_engine::oracle::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy {
    ///     max_attempts: 5,
    ///     initial_backoff: Duration::from_millis(100),
    ///     backoff_multiplier: 2.0,
    ///     max_backoff: Duration::from_millis(350),
    ///     timeout: Duration::from_secs(1),
    /// };
    /// assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
    /// assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
    /// ```
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Runs `op` under the retry policy.
///
/// Each attempt is bounded by `policy.timeout`; a timeout counts as a
/// transient failure. Transient failures are retried until
/// `policy.max_attempts` is reached, then reported as
/// [`OracleError::Unavailable`]. Non-transient failures (schema violations)
/// are returned immediately. Cancellation abandons the in-flight attempt.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    key: &str,
    cancel: &CancelSignal,
    mut op: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            result = timeout(policy.timeout, op()) => match result {
                Ok(inner) => inner,
                Err(_) => Err(OracleError::Timeout {
                    timeout_ms: policy.timeout.as_millis() as u64,
                }),
            },
        };

        let error = match outcome {
            Ok(value) => {
                debug!(key, attempt, "Oracle call succeeded");
                return Ok(value);
            }
            Err(error) if !error.is_transient() => return Err(error),
            Err(error) => error,
        };

        if attempt >= policy.max_attempts {
            warn!(key, attempts = attempt, error = %error, "Oracle retries exhausted");
            return Err(OracleError::Unavailable {
                key: key.to_string(),
                attempts: attempt,
                last_error: error.to_string(),
            });
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Oracle call failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            _ = sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cancel_pair;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(4),
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 3.0,
            max_backoff: Duration::from_millis(1000),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(900));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = call_with_retry(&fast_policy(3), "ANALISTA", &CancelSignal::never(), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(OracleError::Transport {
                        message: "503".to_string(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_unavailable() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> =
            call_with_retry(&fast_policy(2), "ANALISTA", &CancelSignal::never(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OracleError::Transport {
                        message: "connection refused".to_string(),
                    })
                }
            })
            .await;

        match result {
            Err(OracleError::Unavailable { key, attempts, .. }) => {
                assert_eq!(key, "ANALISTA");
                assert_eq!(attempts, 2);
            }
            other => panic!("Expected Unavailable, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_schema_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> =
            call_with_retry(&fast_policy(5), "ANALISTA", &CancelSignal::never(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OracleError::Schema {
                        key: "ANALISTA".to_string(),
                        message: "missing field `excluded`".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(OracleError::Schema { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let result: Result<(), _> =
            call_with_retry(&fast_policy(2), "SP", &CancelSignal::never(), || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(OracleError::Unavailable { attempts, last_error, .. }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_abandons_call() {
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let result: Result<(), _> = call_with_retry(&fast_policy(3), "SP", &signal, || async {
            sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(OracleError::Cancelled));
    }
}
