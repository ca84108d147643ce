//! Retry and circuit breaking for collaborator calls
//!
//! The completion client wraps every HTTP round-trip in a [`RetryPolicy`];
//! a [`CircuitBreaker`] short-circuits calls while the provider keeps failing
//! so that summarization falls back immediately instead of waiting on
//! timeouts for every memory write.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 5_000,
            exponential_base: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        let mut delay_ms = self.config.initial_delay_ms;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("{} succeeded after {} attempts", operation_name, attempt);
                    }
                    return Ok(result);
                },
                Err(err) => {
                    if attempt >= max_attempts || !Self::should_retry(&err) {
                        error!(
                            "{} failed after {} attempt(s): {}",
                            operation_name, attempt, err
                        );
                        return Err(err);
                    }

                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                        operation_name, attempt, max_attempts, err, delay_ms
                    );

                    sleep(Duration::from_millis(delay_ms)).await;

                    delay_ms = ((delay_ms as f64) * self.config.exponential_base) as u64;
                    delay_ms = delay_ms.min(self.config.max_delay_ms);
                },
            }
        }
    }

    pub fn should_retry<E: std::fmt::Display>(error: &E) -> bool {
        let error_str = error.to_string().to_lowercase();

        if error_str.contains("timeout")
            || error_str.contains("timed out")
            || error_str.contains("connection")
            || error_str.contains("error sending request")
            || error_str.contains("temporarily unavailable")
            || error_str.contains("too many requests")
            || error_str.contains("overloaded")
        {
            return true;
        }

        if error_str.contains("invalid")
            || error_str.contains("unauthorized")
            || error_str.contains("forbidden")
            || error_str.contains("not found")
            || error_str.contains("not configured")
        {
            return false;
        }

        true
    }
}

/// Opens after `failure_threshold` consecutive failures and stays open for
/// `recovery_timeout`, after which one trial call is let through.
#[derive(Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    failures: Arc<AtomicU32>,
    last_failure: Arc<Mutex<Option<Instant>>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            failures: Arc::new(AtomicU32::new(0)),
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_open(&self) -> bool {
        let failures = self.failures.load(Ordering::Relaxed);
        if failures < self.failure_threshold {
            return false;
        }

        let last_failure = *self.last_failure.lock();
        if last_failure.is_some_and(|at| at.elapsed() > self.recovery_timeout) {
            self.reset();
            return false;
        }

        true
    }

    pub fn record_success(&self) {
        self.reset();
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Instant::now());
    }

    fn reset(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.last_failure.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            exponential_base: 2.0,
        })
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, String> = fast_policy(3)
            .execute("completion", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("connection reset".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = fast_policy(5)
            .execute("completion", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("401 unauthorized".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_makes_single_attempt() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = RetryPolicy::no_retry()
            .execute("completion", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("connection reset".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_http_send_failures_are_transient() {
        assert!(RetryPolicy::should_retry(
            &"HTTP error: error sending request for url (http://127.0.0.1:9/chat/completions)"
        ));
    }

    #[test]
    fn test_circuit_breaker_opens_and_resets() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_circuit_breaker_half_opens_after_timeout() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(2));
        assert!(!breaker.is_open());
    }
}
