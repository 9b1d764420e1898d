use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{JimakuError, Result};

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Bounded retry-with-backoff policy for network-bound external calls.
/// Delays double per attempt with multiplicative jitter, capped at five
/// minutes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_secs(max_attempts: u32, base_delay_secs: f64) -> Self {
        Self::new(max_attempts, Duration::from_secs_f64(base_delay_secs.max(0.0)))
    }

    /// Run `op` until it succeeds, the error is not retryable, or the
    /// attempt budget is exhausted. The last error is returned unchanged.
    pub async fn run<T, F, Fut, R>(&self, what: &str, retryable: R, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: Fn(&JimakuError) -> bool,
    {
        let mut delay = self.base_delay;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let jitter: f64 = rand::thread_rng().gen_range(0.8..1.2);
                    let wait = delay.mul_f64(jitter).min(MAX_BACKOFF);
                    warn!(
                        "{} attempt {}/{} failed: {} (retrying in {:.1}s)",
                        what,
                        attempt,
                        self.max_attempts,
                        e,
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky_error() -> JimakuError {
        JimakuError::Download("HTTP Error 429: Too Many Requests".to_string())
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", |_| true, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(flaky_error())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("test", |_| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(flaky_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("test", |_| false, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(JimakuError::Download("Video unavailable".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
