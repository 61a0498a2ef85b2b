//! Retry a fallible async operation with classified errors.
//!
//! DESIGN
//! ======
//! Both network clients share this loop. The caller supplies a classifier
//! that maps its own error type onto `ErrorClass`; only `Permanent` aborts
//! early. Backoff doubles from `base_delay` up to `max_delay`, plus uniform
//! jitter, and rate-limited failures wait twice as long.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

/// How a failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Timeout,
    RateLimited,
    Permanent,
}

impl ErrorClass {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    /// A policy that retries without sleeping.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO, jitter: Duration::ZERO }
    }

    /// Deterministic part of the delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn backoff(&self, retry: u32, class: ErrorClass) -> Duration {
        let mut delay = self.delay_for(retry);
        if class == ErrorClass::RateLimited {
            delay = delay.saturating_mul(2);
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms > 0 {
            delay += Duration::from_millis(rand::rng().random_range(0..=jitter_ms));
        }
        delay
    }
}

/// A successful result plus how many attempts it took.
#[derive(Debug, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> Retried<T> {
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// The last error once the loop gave up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
    pub class: ErrorClass,
    /// `true` when the attempt budget ran out, `false` on a permanent abort.
    pub exhausted: bool,
}

impl<E> RetryFailure<E> {
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// `op` receives the 1-based attempt number. `label` only tags log events.
///
/// # Errors
///
/// Returns the last error with its attempt count and class.
pub async fn retry<T, E, Op, Fut, C>(
    label: &str,
    policy: RetryPolicy,
    classify: C,
    mut op: Op,
) -> Result<Retried<T>, RetryFailure<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(op = label, attempt, max_attempts, "retry: succeeded after retrying");
                }
                return Ok(Retried { value, attempts: attempt });
            }
            Err(error) => {
                let class = classify(&error);
                if !class.is_retryable() {
                    warn!(op = label, %error, attempt, "retry: permanent failure; not retrying");
                    return Err(RetryFailure { error, attempts: attempt, class, exhausted: false });
                }
                if attempt >= max_attempts {
                    warn!(op = label, %error, attempt, max_attempts, ?class, "retry: attempts exhausted");
                    return Err(RetryFailure { error, attempts: attempt, class, exhausted: true });
                }
                let delay = policy.backoff(attempt, class);
                warn!(
                    op = label,
                    %error,
                    attempt,
                    max_attempts,
                    ?class,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retry: attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
