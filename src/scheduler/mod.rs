//! Batch scheduling of conversation generation.
//!
//! ```text
//!   ProgressCursor ──count()──► already
//!         │
//!   BatchScheduler loop (single task)
//!         │
//!   ┌─────┴──────┬────────────┐
//!   ▼            ▼            ▼
//! simulate     simulate     simulate      (≤ concurrency, join_all)
//!   │            │            │
//! insert       insert       insert
//!         │
//!   barrier ──► pointer += batch
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dialogue_forge::scheduler::{BatchScheduler, SchedulerConfig};
//!
//! let scheduler = BatchScheduler::new(simulator, store)
//!     .with_config(SchedulerConfig::default().with_rounds(3));
//! let summary = scheduler.run_to_target(1000, 5).await?;
//! println!("persisted {} records", summary.persisted);
//! ```

pub mod batch;
pub mod progress;

pub use batch::{
    BatchScheduler, ProgressAccounting, RunSummary, SchedulerConfig, DEFAULT_BATCH_PAUSE_MS,
    DEFAULT_CONCURRENCY, DEFAULT_MAX_IDLE_BATCHES,
};
pub use progress::ProgressCursor;
