//! Retry policy with fixed backoff

use rand::{RngExt, rng};
use std::fmt::Display;
use std::time::Duration;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay between attempts
    pub backoff: Duration,

    /// Add up to 30% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::from_secs(1),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create retry policy from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("SEKAI_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            backoff: std::env::var("SEKAI_RETRY_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.backoff, Duration::from_millis),
            jitter: std::env::var("SEKAI_RETRY_JITTER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jitter),
        }
    }

    /// Execute a client operation, retrying while [`ClientError::should_retry`]
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_if(ClientError::should_retry, f).await
    }

    /// Execute `f`, retrying errors accepted by `retryable` until the
    /// attempt budget is spent
    pub async fn execute_if<F, Fut, P, T, E>(
        &self,
        retryable: P,
        mut f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if !self.can_retry(attempt, retryable(&e)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Attempt {} failed: {}", attempt, e);
                    self.wait().await;
                }
            }
        }
    }

    /// Whether attempt number `attempt` may be followed by another one
    pub const fn can_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.max_attempts
    }

    /// Sleep for one backoff period
    pub async fn wait(&self) {
        tokio::time::sleep(self.delay()).await;
    }

    fn delay(&self) -> Duration {
        let mut delay = self.backoff;
        if self.jitter {
            let jitter = rng().random_range(0.0..0.3);
            #[allow(clippy::cast_precision_loss)]
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay += Duration::from_millis(jitter_ms);
        }
        delay
    }
}

#[cfg(test)]
#[allow(
    unsafe_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
            jitter: false,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff, Duration::from_secs(1));
        assert!(!policy.jitter);
    }

    #[test]
    fn test_from_env_custom_values() {
        unsafe {
            std::env::set_var("SEKAI_MAX_ATTEMPTS", "6");
            std::env::set_var("SEKAI_RETRY_BACKOFF_MS", "250");
        }

        let policy = RetryPolicy::from_env();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.backoff, Duration::from_millis(250));

        unsafe {
            std::env::remove_var("SEKAI_MAX_ATTEMPTS");
            std::env::remove_var("SEKAI_RETRY_BACKOFF_MS");
        }
    }

    #[tokio::test]
    async fn test_execute_success_on_first_try() {
        let call_count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&call_count);

        let result = fast(4)
            .execute(|| async {
                *counter.lock().expect("lock") += 1;
                Ok::<i32, ClientError>(42)
            })
            .await;

        assert_eq!(result.expect("should succeed"), 42);
        assert_eq!(*call_count.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn test_timeout_attempted_exactly_four_times() {
        let call_count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&call_count);

        let result = fast(4)
            .execute(|| async {
                *counter.lock().expect("lock") += 1;
                Err::<i32, ClientError>(ClientError::Timeout)
            })
            .await;

        assert!(matches!(result, Err(ClientError::Timeout)));
        assert_eq!(*call_count.lock().expect("lock"), 4);
    }

    #[tokio::test]
    async fn test_upgrade_required_attempted_once() {
        let call_count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&call_count);

        let result = fast(4)
            .execute(|| async {
                *counter.lock().expect("lock") += 1;
                Err::<i32, ClientError>(ClientError::UpgradeRequired)
            })
            .await;

        assert!(matches!(result, Err(ClientError::UpgradeRequired)));
        assert_eq!(*call_count.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let call_count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&call_count);

        let start = Instant::now();
        let result = fast(4)
            .execute(|| async {
                let mut count = counter.lock().expect("lock");
                *count += 1;
                if *count < 3 {
                    Err(ClientError::SessionExpired)
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.expect("should succeed"), 7);
        assert_eq!(*call_count.lock().expect("lock"), 3);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_execute_if_custom_predicate() {
        let call_count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&call_count);

        let result = fast(3)
            .execute_if(PoolError::is_remediable, || async {
                *counter.lock().expect("lock") += 1;
                Err::<(), PoolError>(PoolError::Client(ClientError::CookieExpired))
            })
            .await;

        assert!(matches!(
            result,
            Err(PoolError::Client(ClientError::CookieExpired))
        ));
        assert_eq!(*call_count.lock().expect("lock"), 3);
    }

    #[test]
    fn test_can_retry_budget() {
        let policy = fast(4);
        assert!(policy.can_retry(1, true));
        assert!(policy.can_retry(3, true));
        assert!(!policy.can_retry(4, true));
        assert!(!policy.can_retry(1, false));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(100),
            jitter: true,
        };
        for _ in 0..20 {
            let delay = policy.delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay < Duration::from_millis(131));
        }
    }
}
