use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::fetcher::StatsSource;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

/// Fetch one season, retrying transient failures with exponential backoff.
///
/// Non-transient failures are returned immediately. When every attempt fails the
/// last error is wrapped in [`FetchError::Exhausted`].
pub async fn fetch_with_retry<S>(
    source: &S,
    season: i32,
    retry: &RetryConfig,
) -> Result<Vec<Value>, FetchError>
where
    S: StatsSource + ?Sized,
{
    let max_attempts = retry.max_retries.max(1);

    let mut attempt = 1;
    loop {
        match source.fetch_weekly(season).await {
            Ok(rows) => return Ok(rows),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(FetchError::Exhausted { season, attempts: attempt, last: Box::new(e) });
            }
            Err(e) => {
                let delay = retry.delay_after(attempt);
                warn!(
                    "Season {} attempt {}/{} failed: {}, retrying in {:?}",
                    season, attempt, max_attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given status for the first `failures` calls
    struct FlakySource {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StatsSource for FlakySource {
        async fn fetch_weekly(&self, _season: i32) -> Result<Vec<Value>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(FetchError::Status { url: "flaky".into(), status: self.status })
            } else {
                Ok(vec![Value::Null])
            }
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig { max_retries, initial_delay_ms: 1, max_delay_ms: 2, backoff_multiplier: 2.0 }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let source = FlakySource { failures: 2, status: 503, calls: AtomicU32::new(0) };
        let rows = fetch_with_retry(&source, 2020, &fast_retry(3)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let source = FlakySource { failures: 10, status: 429, calls: AtomicU32::new(0) };
        let err = fetch_with_retry(&source, 2020, &fast_retry(3)).await.unwrap_err();
        match err {
            FetchError::Exhausted { season, attempts, last } => {
                assert_eq!(season, 2020);
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Status { status: 429, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let source = FlakySource { failures: 10, status: 403, calls: AtomicU32::new(0) };
        let err = fetch_with_retry(&source, 2020, &fast_retry(5)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
