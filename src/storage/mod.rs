//! Document storage for generated conversations.
//!
//! - [`store`]: the [`ConversationStore`] trait and [`RecordQuery`] filter
//! - [`sqlite`]: [`SqliteStore`], documents as JSON text via `sqlx`
//! - [`memory`]: [`MemoryStore`], in-process
//! - [`document`]: normalization of stored documents into
//!   [`StoredConversation`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use dialogue_forge::storage::{ConversationStore, RecordQuery, SqliteStore};
//!
//! let store = SqliteStore::open("sqlite://dialogue_forge.db").await?;
//! let id = store.insert("synthetic_conversations", &record).await?;
//! let total = store.count("synthetic_conversations").await?;
//! let docs = store
//!     .query("synthetic_conversations", &RecordQuery::training().with_limit(3))
//!     .await?;
//! ```

pub mod document;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use document::{PersonaField, StoredConversation, StoredTurn};
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_DATABASE_URL};
pub use store::{ConversationStore, RecordQuery, SortOrder, DEFAULT_COLLECTION};
