//! End-to-end properties of a generation run against stub collaborators.
//!
//! No network: the generation service is scripted and the store is either
//! in memory or a temporary SQLite file.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use dialogue_forge::conversation::{ConversationSimulator, Sender};
use dialogue_forge::error::{AttemptFailure, LlmError, SchedulerError, StoreError};
use dialogue_forge::export::FineTuneExporter;
use dialogue_forge::llm::{
    GenerationRequest, GenerationService, RateLimitedClient, RecordingSleeper, RetryPolicy,
    ServiceOutcome, TextGenerator,
};
use dialogue_forge::scheduler::{BatchScheduler, ProgressAccounting, SchedulerConfig};
use dialogue_forge::storage::{
    ConversationStore, MemoryStore, RecordQuery, SqliteStore, StoredConversation,
};

const COLLECTION: &str = "synthetic_conversations";

/// Replies with a fixed text after yielding, tracking peak concurrency.
struct CountingGenerator {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingGenerator {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("괜찮아요".to_string())
    }
}

/// Exhausts its retries on one chosen call, succeeds on every other.
struct FailOnCall {
    fail_at: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FailOnCall {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        if call == self.fail_at {
            return Err(LlmError::ExhaustedRetries {
                attempts: 10,
                last_error: AttemptFailure::RateLimited,
            });
        }
        Ok("계속 해봐요".to_string())
    }
}

/// A generation service that replays a script, then always succeeds.
struct ScriptedService {
    script: Mutex<VecDeque<ServiceOutcome>>,
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn send(&self, _request: &GenerationRequest) -> ServiceOutcome {
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| ServiceOutcome::Success(" 좋아요 ".to_string()))
    }
}

/// A store whose count always fails.
struct DownStore;

#[async_trait]
impl ConversationStore for DownStore {
    async fn count(&self, _collection: &str) -> Result<u64, StoreError> {
        Err(StoreError::ConnectionFailed("connection refused".to_string()))
    }

    async fn insert_document(
        &self,
        _collection: &str,
        _body: serde_json::Value,
    ) -> Result<String, StoreError> {
        Err(StoreError::ConnectionFailed("connection refused".to_string()))
    }

    async fn query(
        &self,
        _collection: &str,
        _query: &RecordQuery,
    ) -> Result<Vec<StoredConversation>, StoreError> {
        Err(StoreError::ConnectionFailed("connection refused".to_string()))
    }
}

fn scheduler_with(
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ConversationStore>,
    config: SchedulerConfig,
) -> BatchScheduler {
    let simulator = ConversationSimulator::new(generator).with_turn_pause(Duration::ZERO);
    BatchScheduler::new(simulator, store)
        .with_config(config.with_batch_pause(Duration::ZERO))
}

fn default_config() -> SchedulerConfig {
    SchedulerConfig::default().with_collection(COLLECTION)
}

#[tokio::test]
async fn resumes_from_persisted_count() {
    let store = Arc::new(MemoryStore::new());
    for _ in 0..7 {
        store.insert_document(COLLECTION, json!({"goal": "old"})).await.unwrap();
    }

    let scheduler = scheduler_with(Arc::new(CountingGenerator::new()), store.clone(), default_config());
    let summary = scheduler.run_to_target(10, 3).await.unwrap();

    assert_eq!(summary.already_persisted, 7);
    assert_eq!(summary.batch_sizes, vec![3]);
    assert_eq!(store.count(COLLECTION).await.unwrap(), 10);
}

#[tokio::test]
async fn never_exceeds_concurrency() {
    let generator = Arc::new(CountingGenerator::new());
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with(generator.clone(), store.clone(), default_config().with_rounds(2));

    let summary = scheduler.run_to_target(9, 3).await.unwrap();

    assert_eq!(summary.batch_sizes, vec![3, 3, 3]);
    assert!(generator.peak.load(Ordering::SeqCst) <= 3);
    // 9 records x 4 turns each.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 36);
}

#[tokio::test]
async fn every_record_is_well_formed() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with(Arc::new(CountingGenerator::new()), store.clone(), default_config());
    scheduler.run_to_target(4, 2).await.unwrap();

    let docs = store.query(COLLECTION, &RecordQuery::new()).await.unwrap();
    assert_eq!(docs.len(), 4);
    for doc in docs {
        assert_eq!(doc.conversation.len(), 6);
        assert!(doc.goal.is_some());
        assert!(doc.created_at.is_some());
        for (i, turn) in doc.conversation.iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::User } else { Sender::Coach };
            assert_eq!(turn.sender, expected);
            assert!(!turn.text.is_empty());
        }
    }
}

#[tokio::test]
async fn exhausted_generation_drops_only_that_record() {
    let generator = Arc::new(FailOnCall {
        fail_at: 2,
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with(generator.clone(), store.clone(), default_config().with_rounds(2));

    let summary = scheduler.run_to_target(3, 3).await.unwrap();

    assert_eq!(summary.batch_sizes, vec![3]);
    assert_eq!(summary.launched, 3);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.final_pointer, 3);

    let docs = store.query(COLLECTION, &RecordQuery::new()).await.unwrap();
    assert_eq!(docs.len(), 2);
    for doc in docs {
        assert_eq!(doc.conversation.len(), 4);
        assert!(doc.conversation.iter().all(|t| t.text == "계속 해봐요"));
    }
}

#[tokio::test]
async fn unreachable_store_aborts_before_any_generation() {
    let generator = Arc::new(CountingGenerator::new());
    let scheduler = scheduler_with(generator.clone(), Arc::new(DownStore), default_config());

    let err = scheduler.run_to_target(10, 5).await.unwrap_err();
    assert!(matches!(err, SchedulerError::StoreUnreachable(_)));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn persisted_accounting_stalls_when_nothing_persists() {
    let generator: Arc<dyn TextGenerator> = Arc::new(CountingGenerator::new());
    let scheduler = scheduler_with(
        generator,
        Arc::new(FailingInsertStore::default()),
        default_config()
            .with_accounting(ProgressAccounting::Persisted)
            .with_max_idle_batches(3),
    );

    let err = scheduler.run_to_target(5, 2).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Stalled { batches: 3 }));
}

#[tokio::test]
async fn optimistic_accounting_ends_despite_failed_inserts() {
    let store = Arc::new(FailingInsertStore::default());
    let scheduler = scheduler_with(Arc::new(CountingGenerator::new()), store, default_config());

    let summary = scheduler.run_to_target(5, 2).await.unwrap();
    assert_eq!(summary.final_pointer, 5);
    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.failed, 5);
}

/// Counts fine, rejects every insert.
#[derive(Default)]
struct FailingInsertStore {
    inner: MemoryStore,
}

#[async_trait]
impl ConversationStore for FailingInsertStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.inner.count(collection).await
    }

    async fn insert_document(
        &self,
        _collection: &str,
        _body: serde_json::Value,
    ) -> Result<String, StoreError> {
        Err(StoreError::ConnectionFailed("disk full".to_string()))
    }

    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredConversation>, StoreError> {
        self.inner.query(collection, query).await
    }
}

#[tokio::test]
async fn rate_limited_client_recovers_inside_a_run() {
    let service = Arc::new(ScriptedService {
        script: Mutex::new(VecDeque::from(vec![
            ServiceOutcome::RateLimited,
            ServiceOutcome::EmptyResponse,
            ServiceOutcome::HttpError {
                status: 503,
                body: "overloaded".to_string(),
            },
        ])),
    });
    let sleeper = RecordingSleeper::new();
    let client = RateLimitedClient::new(service)
        .with_policy(RetryPolicy::new(10).with_jitter_max(Duration::ZERO))
        .with_sleeper(Arc::new(sleeper.clone()));

    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with(Arc::new(client), store.clone(), default_config().with_rounds(1));
    let summary = scheduler.run_to_target(1, 1).await.unwrap();

    assert_eq!(summary.persisted, 1);
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_millis(750),
            Duration::from_millis(1125),
            Duration::from_secs(2),
        ]
    );

    let docs = store.query(COLLECTION, &RecordQuery::new()).await.unwrap();
    assert_eq!(docs[0].conversation[0].text, "좋아요");
}

#[tokio::test]
async fn generate_then_export_with_sqlite() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ConversationStore> =
        Arc::new(SqliteStore::open_path(&dir.path().join("forge.db")).await.unwrap());

    let scheduler = scheduler_with(Arc::new(CountingGenerator::new()), store.clone(), default_config());
    scheduler.run_to_target(3, 2).await.unwrap();
    store
        .insert_document(COLLECTION, json!({"test": true, "message": "probe"}))
        .await
        .unwrap();

    let path = dir.path().join("training_data.jsonl");
    let summary = FineTuneExporter::new(store, COLLECTION)
        .export_to(&path)
        .await
        .unwrap();

    assert_eq!(summary.written, 3);
    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        let input = value["textInput"].as_str().unwrap();
        assert!(input.starts_with("사용자: "));
        assert_eq!(input.lines().count(), 5);
        assert_eq!(value["output"], "괜찮아요");
    }
}
