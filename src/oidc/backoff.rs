//! Exponential backoff for provider discovery
//!
//! The retry loop is cooperative: time comes from a [`RetryClock`] and the
//! loop stops on success, when the elapsed-time budget is spent, or when the
//! [`CancellationToken`] fires. Tests drive it with a fake clock and never
//! sleep for real.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng as _;
use tokio_util::sync::CancellationToken;

use crate::error::LoginappError;

/// Retry schedule.
///
/// The n-th delay (0-based) is `initial_interval * multiplier^n`, capped at
/// `max_interval`, then spread by `randomization_factor`:
/// `delay * (1 ± randomization_factor)`. A factor of `0.0` yields a strictly
/// increasing schedule until the cap is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Retries stop once the next delay would exceed this budget.
    pub max_elapsed_time: Duration,
    pub randomization_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Duration::from_secs(15 * 60),
            randomization_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based), without randomization.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use loginapp::oidc::backoff::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.base_delay(0), Duration::from_millis(500));
    /// assert_eq!(policy.base_delay(1), Duration::from_millis(750));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(64) as i32;
        let scaled = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Delay before retry number `attempt`, randomization applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.randomization_factor <= 0.0 {
            return base;
        }
        let spread = self.randomization_factor.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        base.mul_f64(factor)
    }
}

/// Source of time for the retry loop.
#[async_trait]
pub trait RetryClock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Waits for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`RetryClock`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl RetryClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `operation` until it succeeds, the budget is spent, or `cancel` fires.
///
/// Each failed attempt is logged with `target` (usually the issuer URL), the
/// attempt number and the next delay.
///
/// # Errors
///
/// Returns [`LoginappError::Discovery`] on budget exhaustion (carrying the
/// last failure) or on cancellation.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    clock: &dyn RetryClock,
    cancel: &CancellationToken,
    target: &str,
    mut operation: F,
) -> Result<T, LoginappError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LoginappError>>,
{
    let started = clock.now();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(target, attempt));
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(target, attempt)),
            outcome = operation() => outcome,
        };
        attempt += 1;

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(target_url = %target, attempts = attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let delay = policy.delay(attempt - 1);
        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed + delay > policy.max_elapsed_time {
            tracing::error!(
                target_url = %target,
                attempts = attempt,
                elapsed_secs = elapsed.as_secs_f64(),
                error = %err,
                "Giving up"
            );
            return Err(LoginappError::Discovery(format!(
                "giving up on {target} after {attempt} attempts: {}",
                err.response_message()
            )));
        }

        tracing::warn!(
            target_url = %target,
            attempt,
            next_delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        metrics::increment_counter!("loginapp_discovery_retries_total");

        tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(target, attempt)),
            _ = clock.sleep(delay) => {}
        }
    }
}

fn cancelled(target: &str, attempts: u32) -> LoginappError {
    tracing::warn!(target_url = %target, attempts, "Retry loop cancelled");
    LoginappError::Discovery(format!("cancelled while contacting {target}"))
}
