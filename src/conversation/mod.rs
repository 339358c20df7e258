//! Simulated coaching conversations.
//!
//! - [`types`]: `Sender`, `Turn`, `ConversationRecord`
//! - [`prompts`]: prompt builders per turn kind and the output language
//! - [`simulator`]: [`ConversationSimulator`], one record per run

pub mod prompts;
pub mod simulator;
pub mod types;

pub use prompts::OutputLanguage;
pub use simulator::{ConversationSimulator, DEFAULT_ROUNDS, DEFAULT_TURN_PAUSE_MS};
pub use types::{ConversationRecord, Sender, Turn};
