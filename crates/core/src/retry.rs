//! Fixed-count retry for vendor calls

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::{FetchResult, HttpConfig};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// `delay * attempt`
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1_000),
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    pub fn from_http(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            backoff: Backoff::Linear,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay * attempt.max(1),
        }
    }
}

/// Run `op` until it succeeds, returns a non-retryable error, or attempts run out
pub async fn retry_async<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
            backoff: Backoff::Fixed,
        }
    }

    #[test]
    fn test_http_retries_exclude_first_attempt() {
        let config = HttpConfig {
            max_retries: 3,
            ..HttpConfig::default()
        };
        assert_eq!(RetryPolicy::from_http(&config).max_attempts, 4);

        let once = HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        };
        assert_eq!(RetryPolicy::from_http(&once).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_async(quick(3), "flaky", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::transport("reset"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_on_non_retryable() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: FetchResult<()> = retry_async(quick(5), "bad input", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::MissingInput("symbol".into()))
        })
        .await;

        assert!(matches!(result, Err(FetchError::MissingInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: FetchResult<()> = retry_async(quick(2), "down", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status { status: 502, url: "x".into() })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            backoff: Backoff::Linear,
        };
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }
}
