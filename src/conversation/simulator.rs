//! Turn-based simulator producing one conversation record.
//!
//! Protocol for `rounds = R`:
//!
//! ```text
//! user(opening) -> coach -> user(reaction) -> coach -> ... -> coach
//! ```
//!
//! which yields exactly `2 * R` turns. Any failed generation aborts the whole
//! record.

use std::sync::Arc;
use std::time::Duration;

use crate::error::SimulationError;
use crate::llm::{Sleeper, TextGenerator, TokioSleeper};
use crate::personas::Persona;

use super::prompts::{coach_prompt, opening_prompt, reaction_prompt, OutputLanguage};
use super::types::{ConversationRecord, Sender, Turn};

/// Default number of coach replies per record.
pub const DEFAULT_ROUNDS: usize = 3;

/// Default pause after each generated turn in milliseconds.
pub const DEFAULT_TURN_PAUSE_MS: u64 = 100;

/// Drives a [`TextGenerator`] through the conversation protocol.
pub struct ConversationSimulator {
    generator: Arc<dyn TextGenerator>,
    sleeper: Arc<dyn Sleeper>,
    turn_pause: Duration,
    language: OutputLanguage,
}

impl ConversationSimulator {
    /// Create a simulator with default pause and language.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            sleeper: Arc::new(TokioSleeper),
            turn_pause: Duration::from_millis(DEFAULT_TURN_PAUSE_MS),
            language: OutputLanguage::default(),
        }
    }

    /// Set the pause after each turn.
    pub fn with_turn_pause(mut self, pause: Duration) -> Self {
        self.turn_pause = pause;
        self
    }

    /// Set the sleeper used for the turn pause.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the output language.
    pub fn with_language(mut self, language: OutputLanguage) -> Self {
        self.language = language;
        self
    }

    /// Simulate one conversation.
    pub async fn run(
        &self,
        user: &Persona,
        coach: &Persona,
        goal: &str,
        rounds: usize,
    ) -> Result<ConversationRecord, SimulationError> {
        if rounds == 0 {
            return Err(SimulationError::InvalidRounds);
        }

        let mut turns: Vec<Turn> = Vec::with_capacity(rounds * 2);

        let opening = opening_prompt(user, goal, &self.language);
        let text = self.turn(0, Sender::User, &opening).await?;
        turns.push(Turn::new(Sender::User, text, user.kind));

        for round in 0..rounds {
            let previous = turns.last().map(|t| t.text.as_str()).unwrap_or_default();
            let prompt = coach_prompt(coach, user, previous, &self.language);
            let text = self.turn(turns.len(), Sender::Coach, &prompt).await?;
            turns.push(Turn::new(Sender::Coach, text, coach.kind));

            if round + 1 < rounds {
                let previous = turns.last().map(|t| t.text.as_str()).unwrap_or_default();
                let prompt = reaction_prompt(user, previous, &self.language);
                let text = self.turn(turns.len(), Sender::User, &prompt).await?;
                turns.push(Turn::new(Sender::User, text, user.kind));
            }
        }

        tracing::debug!(
            user = user.kind,
            coach = coach.kind,
            goal,
            turns = turns.len(),
            "Conversation simulated"
        );

        Ok(ConversationRecord {
            user_persona: user.kind.to_string(),
            admin_persona: coach.kind.to_string(),
            goal: goal.to_string(),
            conversation: turns,
            created_at: None,
        })
    }

    async fn turn(
        &self,
        index: usize,
        sender: Sender,
        prompt: &str,
    ) -> Result<String, SimulationError> {
        let text = self.generator.generate(prompt).await.map_err(|source| {
            tracing::warn!(turn = index, sender = %sender, error = %source, "Turn generation failed");
            SimulationError::Failed {
                turn: index,
                sender,
                source,
            }
        })?;

        if !self.turn_pause.is_zero() {
            self.sleeper.sleep(self.turn_pause).await;
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AttemptFailure, LlmError};
    use crate::llm::RecordingSleeper;
    use crate::personas::{COACH_PERSONAS, USER_PERSONAS};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every prompt with a numbered reply; fails on call `fail_on`.
    struct StubGenerator {
        prompts: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl StubGenerator {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            let call = prompts.len();
            if self.fail_on == Some(call) {
                return Err(LlmError::ExhaustedRetries {
                    attempts: 10,
                    last_error: AttemptFailure::RateLimited,
                });
            }
            Ok(format!("reply-{call}"))
        }
    }

    fn simulator(generator: Arc<StubGenerator>, sleeper: &RecordingSleeper) -> ConversationSimulator {
        ConversationSimulator::new(generator).with_sleeper(Arc::new(sleeper.clone()))
    }

    #[tokio::test]
    async fn test_three_rounds_produce_six_alternating_turns() {
        let generator = Arc::new(StubGenerator::new());
        let sleeper = RecordingSleeper::new();
        let sim = simulator(generator.clone(), &sleeper);

        let record = sim
            .run(&USER_PERSONAS[0], &COACH_PERSONAS[0], "Quit smoking", 3)
            .await
            .unwrap();

        assert_eq!(record.len(), 6);
        assert!(record.is_well_formed());
        assert_eq!(record.user_persona, "INTJ");
        assert_eq!(record.admin_persona, "Strict PT");
        assert_eq!(record.goal, "Quit smoking");
        assert!(record.created_at.is_none());
        assert_eq!(record.conversation[0].persona, "INTJ");
        assert_eq!(record.conversation[5].persona, "Strict PT");
        assert_eq!(generator.prompts().len(), 6);
        assert_eq!(sleeper.recorded().len(), 6);
    }

    #[tokio::test]
    async fn test_single_round() {
        let generator = Arc::new(StubGenerator::new());
        let sleeper = RecordingSleeper::new();
        let record = simulator(generator, &sleeper)
            .run(&USER_PERSONAS[1], &COACH_PERSONAS[1], "Learn chess", 1)
            .await
            .unwrap();

        let senders: Vec<_> = record.conversation.iter().map(|t| t.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Coach]);
    }

    #[tokio::test]
    async fn test_prompts_embed_only_previous_turn() {
        let generator = Arc::new(StubGenerator::new());
        let sleeper = RecordingSleeper::new();
        simulator(generator.clone(), &sleeper)
            .run(&USER_PERSONAS[0], &COACH_PERSONAS[0], "Quit smoking", 2)
            .await
            .unwrap();

        let prompts = generator.prompts();
        assert!(prompts[1].contains("User Input: \"reply-1\""));
        assert!(prompts[2].contains("Coach Input: \"reply-2\""));
        assert!(prompts[3].contains("User Input: \"reply-3\""));
        assert!(!prompts[3].contains("reply-1"));
    }

    #[tokio::test]
    async fn test_failure_aborts_record() {
        let generator = Arc::new(StubGenerator::failing_on(2));
        let sleeper = RecordingSleeper::new();
        let err = simulator(generator.clone(), &sleeper)
            .run(&USER_PERSONAS[0], &COACH_PERSONAS[0], "Quit smoking", 3)
            .await
            .unwrap_err();

        match err {
            SimulationError::Failed { turn, sender, .. } => {
                assert_eq!(turn, 1);
                assert_eq!(sender, Sender::Coach);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing generated after the failure.
        assert_eq!(generator.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_rounds_rejected() {
        let generator = Arc::new(StubGenerator::new());
        let sleeper = RecordingSleeper::new();
        let err = simulator(generator.clone(), &sleeper)
            .run(&USER_PERSONAS[0], &COACH_PERSONAS[0], "Quit smoking", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidRounds));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_pause_skips_sleep() {
        let generator = Arc::new(StubGenerator::new());
        let sleeper = RecordingSleeper::new();
        simulator(generator, &sleeper)
            .with_turn_pause(Duration::ZERO)
            .run(&USER_PERSONAS[0], &COACH_PERSONAS[0], "Quit smoking", 2)
            .await
            .unwrap();
        assert!(sleeper.recorded().is_empty());
    }
}
