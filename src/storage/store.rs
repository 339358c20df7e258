//! The persistence collaborator trait and its query filter.

use async_trait::async_trait;
use serde_json::Value;

use crate::conversation::ConversationRecord;
use crate::error::StoreError;

use super::document::StoredConversation;

/// Default collection for generated conversations.
pub const DEFAULT_COLLECTION: &str = "synthetic_conversations";

/// Order of query results by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Filter for [`ConversationStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Only documents with a non-empty goal.
    pub require_goal: bool,
    /// Include documents flagged `test`.
    pub include_test: bool,
    /// Maximum results, applied after filtering.
    pub limit: Option<usize>,
    pub order: SortOrder,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordQuery {
    /// Match every document.
    pub fn new() -> Self {
        Self {
            require_goal: false,
            include_test: true,
            limit: None,
            order: SortOrder::OldestFirst,
        }
    }

    /// Documents usable as training data: has a goal, not a test document.
    pub fn training() -> Self {
        Self::new().with_goal_required(true).with_test_documents(false)
    }

    pub fn with_goal_required(mut self, required: bool) -> Self {
        self.require_goal = required;
        self
    }

    pub fn with_test_documents(mut self, include: bool) -> Self {
        self.include_test = include;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether a normalized document passes the filter.
    pub fn matches(&self, doc: &StoredConversation) -> bool {
        if self.require_goal && doc.goal.is_none() {
            return false;
        }
        if !self.include_test && doc.is_test {
            return false;
        }
        true
    }

    /// Filter and truncate documents that are already in the requested order.
    pub fn apply(&self, docs: impl IntoIterator<Item = StoredConversation>) -> Vec<StoredConversation> {
        let filtered = docs.into_iter().filter(|doc| self.matches(doc));
        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}

/// Document store holding conversation records per collection.
///
/// Implementations must accept concurrent inserts.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Number of documents in `collection`, including test documents.
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Insert a raw document. The store assigns `created_at` and returns the
    /// new document id.
    async fn insert_document(&self, collection: &str, body: Value) -> Result<String, StoreError>;

    /// Normalized documents matching `query`.
    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredConversation>, StoreError>;

    /// Insert a conversation record.
    async fn insert(
        &self,
        collection: &str,
        record: &ConversationRecord,
    ) -> Result<String, StoreError> {
        let body = serde_json::to_value(record)?;
        self.insert_document(collection, body).await
    }
}
