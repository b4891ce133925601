use crate::config::RetryConfig;
use crate::error::OracleError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Errors the retry wrapper knows how to classify
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;

    /// Value returned when cancellation is observed
    fn cancelled() -> Self;
}

impl Retryable for OracleError {
    fn is_retryable(&self) -> bool {
        !matches!(self, OracleError::Cancelled)
    }

    fn cancelled() -> Self {
        OracleError::Cancelled
    }
}

/// Execute an async operation with jittered exponential backoff.
///
/// Cancellation is checked before and after every attempt and interrupts the
/// backoff sleep; no attempt starts once the token has fired.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempts = 0;
    let mut backoff_ms = config.backoff_base_ms;

    loop {
        if cancel.is_cancelled() {
            return Err(E::cancelled());
        }
        attempts += 1;

        let result = operation().await;
        if cancel.is_cancelled() {
            return match result {
                Ok(value) => Ok(value),
                Err(_) => Err(E::cancelled()),
            };
        }

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempts >= config.max_attempts => {
                warn!("All {} attempts failed: {}", attempts, e);
                return Err(e);
            }
            Err(e) => {
                // base * 2^attempt + random(0..base)
                let jitter = rand::random::<u64>() % config.backoff_base_ms.max(1);
                let delay = Duration::from_millis(backoff_ms + jitter);

                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, e, delay
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(E::cancelled()),
                    _ = sleep(delay) => {}
                }
                backoff_ms = backoff_ms.saturating_mul(2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            backoff_base_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, OracleError> = retry_with_backoff(&config(), &cancel, || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(OracleError::NoResult)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_all_failures() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, OracleError> = retry_with_backoff(&config(), &cancel, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Reported("overloaded".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(OracleError::Reported(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, OracleError> = retry_with_backoff(&config(), &cancel, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        })
        .await;

        assert!(matches!(result, Err(OracleError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_attempt_is_not_retried() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let token = cancel.clone();

        let result: Result<i32, OracleError> = retry_with_backoff(&config(), &cancel, || {
            let attempts = attempts_clone.clone();
            let token = token.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                token.cancel();
                Err(OracleError::NoResult)
            }
        })
        .await;

        assert!(matches!(result, Err(OracleError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_error_is_not_retried() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, OracleError> = retry_with_backoff(&config(), &cancel, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::Cancelled)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
