//! Exponential backoff for fallible backend calls.
//!
//! [`with_backoff`] wraps any async operation. It is used for every backend call the
//! [`Client`](crate::Client) makes, so there is exactly one implementation of the retry loop.

use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attempts made by [`RetryPolicy::default`].
pub const DEFAULT_ATTEMPTS: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// How often, and how patiently, transient failures are retried.
///
/// The delay between attempt `n` and `n + 1` is `base_delay * 2^(n - 1)`. Without a
/// [`max_delay`](Self::max_delay), the delay keeps doubling until the attempts run out, so large
/// attempt counts lead to very long waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: NonZeroU32,

    /// The delay before the second attempt.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// An optional ceiling for a single delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and default delays.
    pub fn new(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Sets the delay before the second attempt.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Caps every individual delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Returns the delay to wait after the given failed attempt (starting at 1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            base_delay: Duration::from_millis(100),
            max_delay: None,
        }
    }
}

/// Bookkeeping of a single [`with_backoff`] invocation.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    delay: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 1,
            delay: policy.delay_after(1),
        }
    }

    fn advance(&mut self, policy: &RetryPolicy) {
        self.attempt += 1;
        self.delay = policy.delay_after(self.attempt);
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's attempts run out.
///
/// Errors for which `is_retryable` returns `false` are returned right away. Otherwise the
/// operation is attempted up to [`RetryPolicy::max_attempts`] times in total, sleeping with
/// exponential backoff in between. When all attempts fail, the error of the last attempt is
/// returned.
pub async fn with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.get();
    let mut state = RetryState::new(policy);

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return Err(error);
        }

        if state.attempt >= max_attempts {
            tracing::warn!(attempts = state.attempt, %error, "giving up after transient failures");
            return Err(error);
        }

        tracing::debug!(
            attempt = state.attempt,
            delay = ?state.delay,
            %error,
            "retrying after transient failure"
        );
        tokio::time::sleep(state.delay).await;
        state.advance(policy);
    }
}
