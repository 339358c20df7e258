//! Error types for dialogue-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Generation attempts and the retrying LLM client
//! - Conversation simulation
//! - Document store access
//! - Batch scheduling
//! - JSONL export

use std::time::Duration;

use thiserror::Error;

use crate::conversation::Sender;

/// Why a single generation attempt did not produce text.
///
/// Every variant is retryable; the client absorbs these and only surfaces
/// the last one inside [`LlmError::ExhaustedRetries`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("rate limited by generation service (HTTP 429)")]
    RateLimited,

    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("empty response from generation service")]
    EmptyResponse,

    #[error("network error: {0}")]
    Network(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Generation failed after {attempts} attempts, last error: {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        last_error: AttemptFailure,
    },
}

/// Errors that can occur while simulating one conversation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Simulation failed at turn {turn} ({sender}): {source}")]
    Failed {
        turn: usize,
        sender: Sender,
        #[source]
        source: LlmError,
    },

    #[error("A conversation needs at least one round")]
    InvalidRounds,
}

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection to the store failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// In-process store lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors that abort a scheduler run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Document store unreachable at startup: {0}")]
    StoreUnreachable(#[source] StoreError),

    #[error("Concurrency must be greater than 0")]
    InvalidConcurrency,

    #[error("No record persisted in {batches} consecutive batches")]
    Stalled { batches: usize },
}

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
