//! Retry with back-off for any fallible async operation.
//!
//! [`retry_with_backoff`] replays an operation while its error reports itself
//! as [`Retriable`], sleeping between attempts according to a
//! [`RetryPolicy`]. Errors that are not retriable (validation failures,
//! malformed responses) are returned on the first occurrence.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as transient.
pub trait Retriable {
    /// `true` for HTTP 429, 5xx and transport-level failures.
    fn is_retriable(&self) -> bool;

    /// Wait requested by the server (e.g. a `Retry-After` header), if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base × 2^attempt` before retry number `attempt` (1-based).
    Exponential { base: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first try.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Scale each delay by a random factor in `[0.75, 1.25)`.
    pub jitter: bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { base },
            jitter: false,
        }
    }

    #[must_use]
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            jitter: false,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    ///
    /// With an exponential base of 15 s the first three retries wait 30 s,
    /// 60 s and 120 s.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base } => {
                let factor = 1u32 << attempt.min(20);
                base.saturating_mul(factor)
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        delay.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }
}

/// Runs `operation`, retrying transient failures up to `policy.max_retries`
/// times.
///
/// The wait before each retry is the policy delay, or the server-requested
/// wait when that is longer. The last error is returned once retries are
/// exhausted.
///
/// # Errors
///
/// Returns the operation's error when it is not retriable or when every
/// attempt failed.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Retriable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = policy.jittered(policy.delay_for(attempt));
                let delay = err.retry_after().map_or(computed, |hint| hint.max(computed));
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "transient error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        RateLimited,
        Invalid,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::RateLimited => write!(f, "rate limited"),
                TestError::Invalid => write!(f, "invalid"),
            }
        }
    }

    impl Retriable for TestError {
        fn is_retriable(&self) -> bool {
            matches!(self, TestError::RateLimited)
        }
    }

    #[test]
    fn exponential_schedule_doubles_from_base() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(15_000));
        let delays: Vec<u128> = (1..=3).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![30_000, 60_000, 120_000]);
    }

    #[test]
    fn fixed_schedule_is_constant() {
        let policy = RetryPolicy::fixed(10, Duration::from_secs(10));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(7), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_a_quarter_of_the_delay() {
        let policy = RetryPolicy::fixed(1, Duration::from_millis(1_000)).with_jitter(true);
        for _ in 0..100 {
            let ms = policy.jittered(Duration::from_millis(1_000)).as_millis();
            assert!((750..1_250).contains(&ms), "jittered delay {ms} out of range");
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&RetryPolicy::exponential(3, Duration::ZERO), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, TestError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&RetryPolicy::exponential(3, Duration::ZERO), || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::RateLimited)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&RetryPolicy::fixed(2, Duration::ZERO), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::RateLimited)
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(TestError::RateLimited)));
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&RetryPolicy::exponential(3, Duration::ZERO), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::Invalid)
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TestError::Invalid)));
    }

    #[tokio::test(start_paused = true)]
    async fn three_rate_limits_wait_thirty_sixty_one_twenty_seconds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(
            &RetryPolicy::exponential(3, Duration::from_millis(15_000)),
            || {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(TestError::RateLimited)
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_millis(210_000) && elapsed < Duration::from_millis(211_000),
            "expected 30s + 60s + 120s of back-off, got {elapsed:?}"
        );
    }
}
