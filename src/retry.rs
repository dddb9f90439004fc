//! # Retrying Remote Invoker
//!
//! Bounded exponential-backoff retry around a single asynchronous call to a
//! remote generation service. Only rate-limit failures are retried; every
//! other failure is handed straight back to the caller.
//!
//! Attempts are strictly sequential. With the default policy the wrapped
//! operation runs at most three times, waiting 2000 ms before the second
//! attempt and 4000 ms before the third. There is no jitter and no external
//! cancellation.
//!
//! The classifier and the wait step are both injected, so the policy can be
//! exercised with a fake operation and a recording sleeper instead of the
//! wall clock.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Retryable;

/// Total attempts allowed for one logical call.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubles for every further retry.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Backoff parameters for one logical remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: INITIAL_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit limits.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt_index`.
    ///
    /// `initial_delay * 2^attempt_index`, saturating instead of overflowing.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Schedulable wait used between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the caller for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Wall-clock sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    async fn sleep(&self, delay: Duration) {
        (**self).sleep(delay).await;
    }
}

/// One failed attempt of a logical call, kept only while the call is running.
#[derive(Debug)]
pub struct RemoteCallAttempt<'a, E> {
    /// 0-based index of the attempt that failed
    pub attempt: u32,
    /// Failure returned by that attempt
    pub error: &'a E,
    /// Wait scheduled before the next attempt
    pub delay: Duration,
}

impl<E: fmt::Display> fmt::Display for RemoteCallAttempt<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} rate limited ({}), retrying in {}ms",
            self.attempt + 1,
            self.error,
            self.delay.as_millis()
        )
    }
}

/// Run `op` under `policy`, retrying only when `classify` marks the failure
/// as a rate limit.
///
/// Returns the first success, the first non-retryable failure, or the last
/// failure once the attempt budget is spent.
pub async fn retry_with<T, E, Op, Fut, C, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    classify: C,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    S: Sleeper + ?Sized,
    E: fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 0u32;

    loop {
        let error = match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !classify(&error) {
            debug!(attempt = attempt + 1, error = %error, "non-retryable failure");
            return Err(error);
        }

        if attempt + 1 >= attempts {
            warn!(attempts, error = %error, "rate limited, retry budget exhausted");
            return Err(error);
        }

        let record = RemoteCallAttempt {
            attempt,
            error: &error,
            delay: policy.delay_for(attempt),
        };
        warn!(
            attempt = record.attempt + 1,
            delay_ms = record.delay.as_millis() as u64,
            "{}",
            record
        );
        sleeper.sleep(record.delay).await;
        attempt += 1;
    }
}

/// [`retry_with`] using the error type's own [`Retryable`] classification.
pub async fn call_with_retry<T, E, Op, Fut, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Sleeper + ?Sized,
    E: Retryable + fmt::Display,
{
    retry_with(policy, sleeper, |error: &E| error.is_retryable(), op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(3, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(0, Duration::from_millis(10));

        let result: Result<(), String> = retry_with(&policy, &sleeper, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("429".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        let result: Result<u32, String> =
            retry_with(&RetryPolicy::default(), &sleeper, |e: &String| e == "busy", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err("busy".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(1));
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_millis(2000)]);
    }

    #[test]
    fn test_attempt_display() {
        let error = "quota";
        let record = RemoteCallAttempt {
            attempt: 0,
            error: &error,
            delay: Duration::from_millis(2000),
        };
        assert_eq!(
            record.to_string(),
            "attempt 1 rate limited (quota), retrying in 2000ms"
        );
    }
}
