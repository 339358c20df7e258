//! LLM integration for dialogue-forge.
//!
//! - [`gemini`]: one HTTP call to Gemini `generateContent`, classified into a
//!   [`ServiceOutcome`].
//! - [`retry`]: backoff policy and the [`Sleeper`] seam.
//! - [`client`]: [`RateLimitedClient`], the retrying wrapper that implements
//!   [`TextGenerator`].
//! - [`models`]: role to model-name table per deployment environment.
//!
//! ```ignore
//! use dialogue_forge::llm::{GeminiTransport, RateLimitedClient, TextGenerator};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(GeminiTransport::from_env()?);
//! let client = RateLimitedClient::new(transport);
//! let reply = client.generate("Say hello in Korean.").await?;
//! ```

pub mod client;
pub mod gemini;
pub mod models;
pub mod retry;

pub use client::{
    AttemptOutcome, GenerationAttempt, RateLimitedClient, TextGenerator,
    DEFAULT_ATTEMPT_TIMEOUT_SECS,
};
pub use gemini::{GeminiTransport, GenerationRequest, GenerationService, ServiceOutcome};
pub use models::{ModelRegistry, ModelRole};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
