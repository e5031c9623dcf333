//! Retry helpers for API calls.
//!
//! - [`retry_with_backoff`] repeats a call while it fails transiently
//! - [`with_session_recovery`] re-establishes an expired session and retries
//!   the call exactly once

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::ApiError;

/// Backoff settings for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every later retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(retry))
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
///
/// Rate-limit responses wait at least as long as the server asked for.
/// Non-transient errors and the last failure are returned as-is.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut retry = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry + 1 < attempts => {
                let mut delay = policy.delay_for(retry);
                if let ApiError::RateLimited(secs) = &e {
                    delay = delay.max(Duration::from_secs(*secs));
                }
                warn!(
                    error = %e,
                    attempt = retry + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Transient API failure, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run `op`; if it fails with an authentication-class error, run `recover`
/// once and retry `op` exactly once.
///
/// A failure of `recover` is returned instead of the original error. A second
/// authentication failure is returned as-is.
///
/// # Errors
///
/// Returns the error of `op`, or of `recover` if recovery fails.
pub async fn with_session_recovery<T, Op, OpFut, Rec, RecFut>(
    mut op: Op,
    recover: Rec,
) -> Result<T, ApiError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, ApiError>>,
    Rec: FnOnce() -> RecFut,
    RecFut: Future<Output = Result<(), ApiError>>,
{
    match op().await {
        Err(e) if e.is_unauthenticated() => {
            info!(error = %e, "Session rejected, recovering");
            recover().await?;
            op().await
        }
        result => result,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "Service Unavailable".into(),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        let result = retry_with_backoff(&RetryPolicy::default(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;

        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::NotFound("p1".into()))
        })
        .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_honors_retry_after() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        retry_with_backoff(&RetryPolicy::default(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiError::RateLimited(2))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_recovery_retries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let recoveries = AtomicU32::new(0);
        let recoveries = &recoveries;

        let result = with_session_recovery(
            || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::Unauthorized("expired".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            move || async move {
                recoveries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(recoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_returned() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = with_session_recovery(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Unauthorized("expired".into()))
            },
            move || async move { Ok(()) },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_recovery_is_returned() {
        let result: Result<(), _> = with_session_recovery(
            move || async move { Err(ApiError::Unauthorized("expired".into())) },
            move || async move { Err(ApiError::Session("no region".into())) },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Session(_))));
    }

    #[tokio::test]
    async fn test_other_errors_skip_recovery() {
        let recoveries = AtomicU32::new(0);
        let recoveries = &recoveries;
        let result: Result<(), _> = with_session_recovery(
            move || async move { Err(ApiError::NotFound("cart".into())) },
            move || async move {
                recoveries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(recoveries.load(Ordering::SeqCst), 0);
    }
}
