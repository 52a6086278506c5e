//! Retry helper with linear backoff.
//!
//! Wraps flaky external calls at their call sites. The delay grows
//! linearly (`base_delay × attempt`), and a predicate decides which
//! failures are worth another attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for one call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Base delay; attempt N waits `base_delay × N` before retrying.
    pub base_delay: Duration,
    /// Call-site name for logging.
    pub operation: &'static str,
}

impl RetryPolicy {
    pub fn new(operation: &'static str, attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            operation,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` until it succeeds, the predicate rejects the error, or the
/// attempt budget runs out. Returns the last error on exhaustion.
pub async fn retry_with<F, Fut, T, E>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    op: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    operation = policy.operation,
                    attempt,
                    ?delay,
                    "retrying after error: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    warn!(
                        operation = policy.operation,
                        attempts = attempt,
                        "giving up: {e}"
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new("test", 3, Duration::from_millis(10));

        let result: Result<u32, String> = retry_with(&policy, |_| true, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {n} failed"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_short_circuits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new("test", 5, Duration::from_millis(10));

        let result: Result<(), String> = retry_with(&policy, |_| false, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("deterministic".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::new("test", 4, Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(6));
    }
}
