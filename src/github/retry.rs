//! Exponential backoff for GitHub calls.

use chrono::Utc;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{IntakeError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_rate_limit_wait: Duration::from_secs(config.max_rate_limit_wait_secs),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based): initial, doubled each
    /// time, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// How long to wait before retrying `err`, or `None` to give up now.
    pub fn delay_for(&self, err: &IntakeError, attempt: u32) -> Option<Duration> {
        match err {
            IntakeError::RateLimited { reset_at } => {
                let wait = (*reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                (wait <= self.max_rate_limit_wait).then_some(wait)
            }
            e if e.is_retryable() => Some(self.backoff(attempt)),
            _ => None,
        }
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                let Some(delay) = policy.delay_for(&err, attempt) else {
                    return Err(err);
                };
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying GitHub call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            ..fast_policy()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }

    #[test]
    fn test_long_rate_limit_wait_is_not_retried() {
        let policy = fast_policy();
        let soon = IntakeError::RateLimited {
            reset_at: Utc::now(),
        };
        assert!(policy.delay_for(&soon, 1).is_some());
        let later = IntakeError::RateLimited {
            reset_at: Utc::now() + chrono::Duration::minutes(30),
        };
        assert!(policy.delay_for(&later, 1).is_none());
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(IntakeError::Transient("502".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(IntakeError::NotFound("acme/missing".into())) }
        })
        .await;
        assert!(matches!(result, Err(IntakeError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(IntakeError::Timeout("slow".into())) }
        })
        .await;
        assert!(matches!(result, Err(IntakeError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
