//! Retry with exponential backoff, jitter and cooperative cancellation.
//!
//! Attempt `n` (0-based) that fails with a retryable error is followed by
//! a sleep of `min(initial_delay * multiplier^n, max_delay)`, inflated by
//! up to 20 % when jitter is on. At most `max_retries + 1` attempts are
//! made. The cancellation token is checked before every attempt and raced
//! against the attempt itself and every sleep.

use std::fmt;
use std::future::Future;
use std::time::Duration;

pub use arealink_core::Cancelled;
use arealink_core::RetrySettings;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const JITTER_FRACTION: f64 = 0.2;


#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            multiplier: s.multiplier,
            jitter: s.jitter,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps; one attempt only.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Un-jittered delay after failed attempt `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exp))
            .min(max)
            .max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    fn backoff(&self, retry: u32) -> Duration {
        let base = self.delay_for(retry);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..JITTER_FRACTION);
        base.mul_f64(factor)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned unchanged.
pub async fn retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: From<Cancelled> + fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            r = op() => r,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= policy.max_retries || !is_retryable(&err) {
            return Err(err);
        }

        let delay = policy.backoff(attempt);
        attempt += 1;
        warn!(
            error = %err,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
