use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Run `f`, retrying with doubling backoff while `is_transient` holds for its error.
    ///
    /// The last error is returned once the retry budget is spent.
    pub async fn retry<F, Fut, T, E, P>(
        &self,
        operation: &str,
        mut f: F,
        is_transient: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut backoff = self.initial_backoff;
        let mut retries = 0;

        loop {
            let err = match f().await {
                Ok(value) => {
                    if retries > 0 {
                        info!(operation, retries, "Recovered after retrying");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !is_transient(&err) || retries >= self.max_retries {
                if retries > 0 {
                    warn!(operation, retries, error = %err, "Giving up after retries");
                }
                return Err(err);
            }

            retries += 1;
            warn!(
                operation,
                retry = retries,
                of = self.max_retries,
                wait_ms = backoff.as_millis() as u64,
                error = %err,
                "Transient failure, backing off"
            );
            sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 1000, 10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let policy = RetryPolicy::new(3, 1, 2);
        let calls = AtomicUsize::new(0);

        let result: Result<u32, String> = policy
            .retry(
                "flaky",
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err("busy".to_string()) } else { Ok(7) }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 1, 1);
        let calls = AtomicUsize::new(0);

        let result: Result<(), String> = policy
            .retry(
                "down",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down".to_string())
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::new(5, 1, 1);
        let calls = AtomicUsize::new(0);

        let result: Result<(), String> = policy
            .retry(
                "bad request",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("400".to_string())
                },
                |e| e != "400",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
