//! Rate-limited, retrying client around a single generation call.
//!
//! Each attempt is bounded by its own timeout. Every non-success outcome is
//! retryable and absorbed here; callers only ever see trimmed, non-empty text
//! or [`LlmError::ExhaustedRetries`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::RngExt;

use super::gemini::{GenerationRequest, GenerationService, ServiceOutcome};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::error::{AttemptFailure, LlmError};

/// Default per-attempt timeout in seconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// Anything that turns a prompt into a non-empty reply.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Outcome kind of one attempt, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    HttpError,
    Timeout,
    NetworkError,
    EmptyResponse,
}

impl AttemptOutcome {
    fn of(failure: &AttemptFailure) -> Self {
        match failure {
            AttemptFailure::RateLimited => Self::RateLimited,
            AttemptFailure::Upstream { .. } => Self::HttpError,
            AttemptFailure::EmptyResponse => Self::EmptyResponse,
            AttemptFailure::Network(_) => Self::NetworkError,
            AttemptFailure::Timeout(_) => Self::Timeout,
        }
    }

    /// Stable lowercase label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RateLimited => "rate_limited",
            Self::HttpError => "http_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// One attempt of one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    /// 1-based attempt index.
    pub attempt: u32,
    /// What happened.
    pub outcome: AttemptOutcome,
    /// Time spent waiting on the service.
    pub latency: Duration,
    /// Delay slept before the next attempt; `None` on success or when the
    /// budget is spent.
    pub backoff: Option<Duration>,
}

/// Retrying client over a [`GenerationService`].
pub struct RateLimitedClient {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
    model: Option<String>,
    last_attempts: Mutex<Vec<GenerationAttempt>>,
}

impl RateLimitedClient {
    /// Create a client with the default policy and the tokio timer.
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            sleeper: Arc::new(TokioSleeper),
            model: None,
            last_attempts: Mutex::new(Vec::new()),
        }
    }

    /// Set the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the sleeper used for backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Pin every request to a model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attempts made by the most recently finished `generate` call.
    ///
    /// With concurrent callers this reflects whichever call finished last.
    pub fn last_attempts(&self) -> Vec<GenerationAttempt> {
        self.last_attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    fn build_request(&self, prompt: &str) -> GenerationRequest {
        let request = GenerationRequest::new(prompt);
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    /// Run one attempt and reduce it to text or a retryable failure.
    async fn attempt(&self, request: &GenerationRequest) -> Result<String, AttemptFailure> {
        let outcome = tokio::time::timeout(self.attempt_timeout, self.service.send(request))
            .await
            .map_err(|_| AttemptFailure::Timeout(self.attempt_timeout))?;

        match outcome {
            ServiceOutcome::Success(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Err(AttemptFailure::EmptyResponse)
                } else {
                    Ok(trimmed.to_string())
                }
            }
            ServiceOutcome::RateLimited => Err(AttemptFailure::RateLimited),
            ServiceOutcome::HttpError { status, body } => {
                Err(AttemptFailure::Upstream { status, body })
            }
            ServiceOutcome::EmptyResponse => Err(AttemptFailure::EmptyResponse),
            ServiceOutcome::NetworkError(message) => Err(AttemptFailure::Network(message)),
        }
    }

    fn record(&self, attempts: Vec<GenerationAttempt>) {
        if let Ok(mut last) = self.last_attempts.lock() {
            *last = attempts;
        }
    }
}

#[async_trait]
impl TextGenerator for RateLimitedClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(prompt);
        let mut attempts = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.attempt(&request).await;
            let latency = started.elapsed();

            let failure = match result {
                Ok(text) => {
                    tracing::debug!(
                        attempt,
                        outcome = AttemptOutcome::Success.as_str(),
                        latency_ms = latency.as_millis() as u64,
                        "Generation attempt succeeded"
                    );
                    attempts.push(GenerationAttempt {
                        attempt,
                        outcome: AttemptOutcome::Success,
                        latency,
                        backoff: None,
                    });
                    self.record(attempts);
                    return Ok(text);
                }
                Err(failure) => failure,
            };

            let outcome = AttemptOutcome::of(&failure);
            let backoff = if self.policy.should_retry(attempt) {
                let sample: f64 = rand::rng().random_range(0.0..1.0);
                Some(self.policy.delay_for(&failure, attempt, sample))
            } else {
                None
            };
            let backoff_ms = backoff.map(|d| d.as_millis() as u64).unwrap_or(0);
            let latency_ms = latency.as_millis() as u64;

            match &failure {
                AttemptFailure::RateLimited | AttemptFailure::EmptyResponse => {
                    tracing::info!(
                        attempt,
                        outcome = outcome.as_str(),
                        latency_ms,
                        backoff_ms,
                        "Generation throttled, backing off"
                    );
                }
                AttemptFailure::Upstream { status, body } => {
                    tracing::warn!(
                        attempt,
                        outcome = outcome.as_str(),
                        latency_ms,
                        backoff_ms,
                        status,
                        body = %body,
                        "Generation service returned an error"
                    );
                }
                AttemptFailure::Network(_) | AttemptFailure::Timeout(_) => {
                    tracing::warn!(
                        attempt,
                        outcome = outcome.as_str(),
                        latency_ms,
                        backoff_ms,
                        error = %failure,
                        "Generation attempt failed"
                    );
                }
            }

            attempts.push(GenerationAttempt {
                attempt,
                outcome,
                latency,
                backoff,
            });

            match backoff {
                Some(delay) => self.sleeper.sleep(delay).await,
                None => {
                    tracing::error!(
                        attempts = attempt,
                        last_error = %failure,
                        "Generation retries exhausted"
                    );
                    self.record(attempts);
                    return Err(LlmError::ExhaustedRetries {
                        attempts: attempt,
                        last_error: failure,
                    });
                }
            }
        }
    }
}
