//! dialogue-forge: synthetic coaching-dialogue generator.
//!
//! Simulates conversations between a user persona and a coach persona with
//! Gemini, persists them to a document store across resumable runs, and
//! exports them as fine-tuning JSONL.

pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod export;
pub mod llm;
pub mod personas;
pub mod scheduler;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigError, GenerationConfig};
pub use error::{
    AttemptFailure, ExportError, LlmError, SchedulerError, SimulationError, StoreError,
};
