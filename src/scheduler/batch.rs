//! Bounded-concurrency batch scheduler.
//!
//! One controlling task runs waves of at most `concurrency` simulations. A
//! wave is polled to completion with `join_all` before the progress pointer
//! moves, so the pointer is only ever touched between waves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::conversation::{ConversationSimulator, DEFAULT_ROUNDS};
use crate::error::{SchedulerError, SimulationError, StoreError};
use crate::llm::{Sleeper, TokioSleeper};
use crate::personas::{Assignment, PersonaCatalog};
use crate::storage::{ConversationStore, DEFAULT_COLLECTION};

use super::progress::ProgressCursor;

/// Default pause between batches in milliseconds.
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 100;

/// Default number of concurrent simulations per batch.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Consecutive empty batches tolerated under persisted accounting.
pub const DEFAULT_MAX_IDLE_BATCHES: usize = 5;

/// How the progress pointer advances after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressAccounting {
    /// By the number of launched runs, whether or not they persisted.
    #[default]
    Optimistic,
    /// By the number of records actually inserted.
    Persisted,
}

impl fmt::Display for ProgressAccounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimistic => write!(f, "optimistic"),
            Self::Persisted => write!(f, "persisted"),
        }
    }
}

impl FromStr for ProgressAccounting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "persisted" => Ok(Self::Persisted),
            other => Err(format!(
                "unknown accounting mode '{}', expected 'optimistic' or 'persisted'",
                other
            )),
        }
    }
}

/// Scheduler settings other than target and concurrency.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub collection: String,
    pub rounds: usize,
    pub batch_pause: Duration,
    pub accounting: ProgressAccounting,
    pub max_idle_batches: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            rounds: DEFAULT_ROUNDS,
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            accounting: ProgressAccounting::default(),
            max_idle_batches: DEFAULT_MAX_IDLE_BATCHES,
        }
    }
}

impl SchedulerConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn with_accounting(mut self, accounting: ProgressAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    pub fn with_max_idle_batches(mut self, batches: usize) -> Self {
        self.max_idle_batches = batches;
        self
    }
}

/// Outcome of one `run_to_target` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Count read from the store at startup.
    pub already_persisted: u64,
    /// Size of each launched batch, in order.
    pub batch_sizes: Vec<usize>,
    /// Total simulations launched.
    pub launched: u64,
    /// Records inserted by this run.
    pub persisted: u64,
    /// Runs that failed in simulation or insert.
    pub failed: u64,
    /// Progress pointer when the loop ended.
    pub final_pointer: u64,
}

/// Why one record was not persisted.
#[derive(Debug, Error)]
enum RecordFailure {
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),

    #[error("insert failed: {0}")]
    Store(#[from] StoreError),
}

/// Fans out simulations in waves until the collection reaches the target.
pub struct BatchScheduler {
    simulator: ConversationSimulator,
    store: Arc<dyn ConversationStore>,
    catalog: PersonaCatalog,
    config: SchedulerConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl BatchScheduler {
    pub fn new(simulator: ConversationSimulator, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            simulator,
            store,
            catalog: PersonaCatalog::builtin(),
            config: SchedulerConfig::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_catalog(mut self, catalog: PersonaCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set the sleeper used for the pause between batches.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Generate records until `target` is reached by the progress pointer.
    pub async fn run_to_target(
        &self,
        target: u64,
        concurrency: usize,
    ) -> Result<RunSummary, SchedulerError> {
        if concurrency == 0 {
            return Err(SchedulerError::InvalidConcurrency);
        }

        let cursor = ProgressCursor::new(self.store.clone(), self.config.collection.clone());
        let already = cursor.current_count().await?;

        let mut summary = RunSummary {
            already_persisted: already,
            final_pointer: already,
            ..Default::default()
        };

        if already >= target {
            tracing::info!(already, target, "Target already reached, nothing to generate");
            return Ok(summary);
        }

        tracing::info!(
            already,
            target,
            remaining = target - already,
            concurrency,
            accounting = %self.config.accounting,
            "Starting generation"
        );

        let started = Instant::now();
        let mut pointer = already;
        let mut idle_batches = 0usize;

        while pointer < target {
            let remaining = target - pointer;
            let batch_size = remaining.min(concurrency as u64) as usize;
            let batch_index = summary.batch_sizes.len() + 1;

            let assignments: Vec<Assignment> =
                (0..batch_size).map(|_| self.catalog.draw()).collect();
            let runs = assignments
                .into_iter()
                .enumerate()
                .map(|(slot, assignment)| self.produce(batch_index, slot, assignment));
            let results = futures::future::join_all(runs).await;

            let mut successes = 0u64;
            for result in results {
                match result {
                    Ok(_) => successes += 1,
                    Err(e) => {
                        summary.failed += 1;
                        tracing::warn!(batch = batch_index, error = %e, "Record dropped");
                    }
                }
            }

            summary.batch_sizes.push(batch_size);
            summary.launched += batch_size as u64;
            summary.persisted += successes;

            pointer += match self.config.accounting {
                ProgressAccounting::Optimistic => batch_size as u64,
                ProgressAccounting::Persisted => successes,
            };

            tracing::info!(
                batch = batch_index,
                size = batch_size,
                persisted = successes,
                failed = batch_size as u64 - successes,
                pointer,
                target,
                elapsed_secs = started.elapsed().as_secs(),
                "Batch settled"
            );

            if successes == 0 && self.config.accounting == ProgressAccounting::Persisted {
                idle_batches += 1;
                if idle_batches >= self.config.max_idle_batches {
                    tracing::error!(
                        batches = idle_batches,
                        pointer,
                        target,
                        "No progress, giving up"
                    );
                    return Err(SchedulerError::Stalled {
                        batches: idle_batches,
                    });
                }
            } else {
                idle_batches = 0;
            }

            if pointer < target && !self.config.batch_pause.is_zero() {
                self.sleeper.sleep(self.config.batch_pause).await;
            }
        }

        summary.final_pointer = pointer;
        tracing::info!(
            launched = summary.launched,
            persisted = summary.persisted,
            failed = summary.failed,
            batches = summary.batch_sizes.len(),
            final_pointer = pointer,
            "Generation finished"
        );
        Ok(summary)
    }

    /// Simulate and insert one record.
    async fn produce(
        &self,
        batch: usize,
        slot: usize,
        assignment: Assignment,
    ) -> Result<String, RecordFailure> {
        let record = self
            .simulator
            .run(
                &assignment.user,
                &assignment.coach,
                assignment.goal,
                self.config.rounds,
            )
            .await?;

        let id = self.store.insert(&self.config.collection, &record).await?;
        tracing::debug!(
            batch,
            slot,
            id = %id,
            user = assignment.user.kind,
            coach = assignment.coach.kind,
            goal = assignment.goal,
            "Record persisted"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{RecordingSleeper, TextGenerator};
    use crate::storage::{MemoryStore, RecordQuery, StoredConversation};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok("ok".to_string())
        }
    }

    /// Rejects every other insert.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        inserts: AtomicU64,
    }

    #[async_trait]
    impl ConversationStore for FlakyStore {
        async fn count(&self, collection: &str) -> Result<u64, StoreError> {
            self.inner.count(collection).await
        }

        async fn insert_document(&self, collection: &str, body: Value) -> Result<String, StoreError> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StoreError::ConnectionFailed("write rejected".to_string()));
            }
            self.inner.insert_document(collection, body).await
        }

        async fn query(
            &self,
            collection: &str,
            query: &RecordQuery,
        ) -> Result<Vec<StoredConversation>, StoreError> {
            self.inner.query(collection, query).await
        }
    }

    fn scheduler(store: Arc<dyn ConversationStore>, sleeper: &RecordingSleeper) -> BatchScheduler {
        let simulator = ConversationSimulator::new(Arc::new(EchoGenerator))
            .with_turn_pause(Duration::ZERO);
        BatchScheduler::new(simulator, store)
            .with_config(SchedulerConfig::default().with_collection("c").with_rounds(1))
            .with_sleeper(Arc::new(sleeper.clone()))
    }

    #[tokio::test]
    async fn test_batches_respect_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let sleeper = RecordingSleeper::new();
        let summary = scheduler(store.clone(), &sleeper)
            .run_to_target(5, 2)
            .await
            .unwrap();

        assert_eq!(summary.batch_sizes, vec![2, 2, 1]);
        assert_eq!(summary.launched, 5);
        assert_eq!(summary.persisted, 5);
        assert_eq!(summary.final_pointer, 5);
        assert_eq!(store.count("c").await.unwrap(), 5);
        // Pauses between batches only.
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_already_at_target_launches_nothing() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..3 {
            store.insert_document("c", serde_json::json!({})).await.unwrap();
        }
        let sleeper = RecordingSleeper::new();
        let summary = scheduler(store.clone(), &sleeper)
            .run_to_target(3, 5)
            .await
            .unwrap();

        assert_eq!(summary.already_persisted, 3);
        assert!(summary.batch_sizes.is_empty());
        assert_eq!(summary.launched, 0);
        assert_eq!(store.count("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let sleeper = RecordingSleeper::new();
        let err = scheduler(Arc::new(MemoryStore::new()), &sleeper)
            .run_to_target(5, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConcurrency));
    }

    #[tokio::test]
    async fn test_insert_failures_are_isolated() {
        let store = Arc::new(FlakyStore::default());
        let sleeper = RecordingSleeper::new();
        let summary = scheduler(store.clone(), &sleeper)
            .run_to_target(4, 4)
            .await
            .unwrap();

        assert_eq!(summary.batch_sizes, vec![4]);
        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.failed, 2);
        // Optimistic accounting counts launches.
        assert_eq!(summary.final_pointer, 4);
        assert_eq!(store.count("c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_persisted_accounting_keeps_going() {
        let store = Arc::new(FlakyStore::default());
        let sleeper = RecordingSleeper::new();
        let summary = scheduler(store.clone(), &sleeper)
            .with_config(
                SchedulerConfig::default()
                    .with_collection("c")
                    .with_rounds(1)
                    .with_accounting(ProgressAccounting::Persisted),
            )
            .run_to_target(4, 4)
            .await
            .unwrap();

        assert_eq!(summary.final_pointer, 4);
        assert_eq!(summary.persisted, 4);
        assert_eq!(store.count("c").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_assignments_come_from_catalog() {
        use crate::personas::{COACH_PERSONAS, GOALS, USER_PERSONAS};

        let store = Arc::new(MemoryStore::new());
        let sleeper = RecordingSleeper::new();
        let catalog =
            PersonaCatalog::new(&USER_PERSONAS[..1], &COACH_PERSONAS[..1], &GOALS[..1]).unwrap();
        scheduler(store.clone(), &sleeper)
            .with_catalog(catalog)
            .run_to_target(3, 3)
            .await
            .unwrap();

        let docs = store.query("c", &RecordQuery::new()).await.unwrap();
        assert_eq!(docs.len(), 3);
        for doc in docs {
            assert_eq!(doc.user_persona, USER_PERSONAS[0].kind);
            assert_eq!(doc.admin_persona, COACH_PERSONAS[0].kind);
            assert_eq!(doc.goal.as_deref(), Some(GOALS[0]));
        }
    }

    #[test]
    fn test_accounting_parse() {
        assert_eq!(
            "Persisted".parse::<ProgressAccounting>().unwrap(),
            ProgressAccounting::Persisted
        );
        assert_eq!(
            "optimistic".parse::<ProgressAccounting>().unwrap(),
            ProgressAccounting::Optimistic
        );
        assert!("eventual".parse::<ProgressAccounting>().is_err());
    }
}
