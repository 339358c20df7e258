//! Backoff policy shared by every retryable generation call.
//!
//! Throttling outcomes (rate limits, empty responses) back off exponentially
//! up to a small ceiling; other transient failures wait a flat delay. Both
//! add uniform jitter. Sleeping goes through the [`Sleeper`] trait so the
//! policy can be exercised without real time passing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AttemptFailure;

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default base delay for exponential backoff in milliseconds.
const BASE_DELAY_MS: u64 = 500;

/// Default growth factor per attempt.
const GROWTH_FACTOR: f64 = 1.5;

/// Default ceiling for throttling backoff in milliseconds.
const THROTTLE_CAP_MS: u64 = 5_000;

/// Default flat delay for generic errors in milliseconds.
const ERROR_DELAY_MS: u64 = 2_000;

/// Default maximum jitter in milliseconds.
const JITTER_MAX_MS: u64 = 250;

/// Hard upper bound on any single delay in milliseconds.
const MAX_DELAY_MS: u64 = 30_000;

/// Retry policy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed for one call, including the first.
    pub max_attempts: u32,
    /// Base delay for throttling backoff.
    pub base_delay: Duration,
    /// Multiplier applied per attempt.
    pub growth: f64,
    /// Ceiling for rate-limited and empty-response backoff.
    pub throttle_cap: Duration,
    /// Flat delay for upstream, network, and timeout failures.
    pub error_delay: Duration,
    /// Upper bound of the uniform jitter added to every delay.
    pub jitter_max: Duration,
    /// Absolute ceiling applied after jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            growth: GROWTH_FACTOR,
            throttle_cap: Duration::from_millis(THROTTLE_CAP_MS),
            error_delay: Duration::from_millis(ERROR_DELAY_MS),
            jitter_max: Duration::from_millis(JITTER_MAX_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with default delays and the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay for throttling backoff.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the growth factor.
    pub fn with_growth(mut self, growth: f64) -> Self {
        self.growth = growth;
        self
    }

    /// Sets the throttling ceiling.
    pub fn with_throttle_cap(mut self, cap: Duration) -> Self {
        self.throttle_cap = cap;
        self
    }

    /// Sets the flat delay used for generic errors.
    pub fn with_error_delay(mut self, delay: Duration) -> Self {
        self.error_delay = delay;
        self
    }

    /// Sets the maximum jitter.
    pub fn with_jitter_max(mut self, jitter: Duration) -> Self {
        self.jitter_max = jitter;
        self
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Computes the delay to wait after `attempt` (1-based) failed.
    ///
    /// `jitter_sample` is a value in `[0.0, 1.0)` scaled onto `jitter_max`;
    /// callers draw it from an RNG, tests pass fixed values.
    pub fn delay_for(&self, failure: &AttemptFailure, attempt: u32, jitter_sample: f64) -> Duration {
        let core = match failure {
            AttemptFailure::RateLimited | AttemptFailure::EmptyResponse => {
                let exp = self.growth.powi(attempt.min(64) as i32);
                let millis = self.base_delay.as_millis() as f64 * exp;
                let capped = millis.min(self.throttle_cap.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
            AttemptFailure::Upstream { .. }
            | AttemptFailure::Network(_)
            | AttemptFailure::Timeout(_) => self.error_delay,
        };

        let jitter = self.jitter_max.mul_f64(jitter_sample.clamp(0.0, 1.0));
        (core + jitter).min(self.max_delay)
    }
}

/// Abstraction over waiting, so backoff can run against a fake clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Sleeper that returns immediately and records every requested delay.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates an empty recording sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delays requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|slept| slept.clone())
            .unwrap_or_default()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.recorded().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}
