//! Bounded retry with exponential backoff and jitter for source requests.
//!
//! The retry budget is local to each call: a request that exhausts it
//! surfaces its last error to the calling step, which degrades gracefully.

use paperscout_core::config::RetryConfig;
use paperscout_core::error::SourceError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for paper-source HTTP calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation`, retrying transient failures with backoff.
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T, SourceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !is_retryable(&e) || attempt == self.config.max_retries {
                        return Err(e);
                    }
                    let delay_ms = self.backoff_ms(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.config.max_retries,
                        delay_ms,
                        error = %e,
                        "Retrying source request"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(SourceError::Request {
            provider: "unknown".to_string(),
            message: "All retry attempts exhausted".to_string(),
        }))
    }

    fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_ms as f64) as u64;
        if self.config.jitter {
            // Up to one extra second, spreading concurrent retries apart.
            capped + rand::thread_rng().gen_range(0..1000)
        } else {
            capped
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Whether a source error is worth retrying.
///
/// Transport failures, rate limits (429), and server errors (5xx) retry;
/// other client errors and parse failures fail fast.
pub fn is_retryable(err: &SourceError) -> bool {
    match err {
        SourceError::Request { .. } => true,
        SourceError::Status { status, .. } => *status == 429 || *status >= 500,
        SourceError::Parse { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 1.0,
            jitter: false,
        })
    }

    fn transport_err() -> SourceError {
        SourceError::Request {
            provider: "test".into(),
            message: "connection reset".into(),
        }
    }

    #[test]
    fn test_is_retryable_classification() {
        assert!(is_retryable(&transport_err()));
        assert!(is_retryable(&SourceError::Status {
            provider: "t".into(),
            status: 429
        }));
        assert!(is_retryable(&SourceError::Status {
            provider: "t".into(),
            status: 503
        }));
        assert!(!is_retryable(&SourceError::Status {
            provider: "t".into(),
            status: 404
        }));
        assert!(!is_retryable(&SourceError::Parse {
            provider: "t".into(),
            message: "bad xml".into()
        }));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 300,
            backoff_multiplier: 2.0,
            jitter: false,
        });
        assert_eq!(policy.backoff_ms(0), 100);
        assert_eq!(policy.backoff_ms(1), 200);
        assert_eq!(policy.backoff_ms(2), 300); // capped
        assert_eq!(policy.backoff_ms(3), 300);
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            jitter: true,
        });
        for _ in 0..20 {
            let delay = policy.backoff_ms(0);
            assert!((100..1100).contains(&delay));
        }
    }

    #[tokio::test]
    async fn test_run_succeeds_first_try() {
        let policy = fast_policy(3);
        let result = policy.run(|| async { Ok::<_, SourceError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_run_retries_transient_then_succeeds() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = policy
            .run(|| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transport_err())
                    } else {
                        Ok(9)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_fails_fast_on_permanent_error() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, _> = policy
            .run(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Status {
                        provider: "t".into(),
                        status: 404,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_exhausts_budget() {
        let policy = fast_policy(2);
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, _> = policy
            .run(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(transport_err())
                }
            })
            .await;
        assert!(result.is_err());
        // Initial call plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
