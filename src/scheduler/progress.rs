//! Startup progress read for resumable runs.

use std::sync::Arc;

use crate::error::SchedulerError;
use crate::storage::ConversationStore;

/// Reads how many records a collection already holds.
#[derive(Clone)]
pub struct ProgressCursor {
    store: Arc<dyn ConversationStore>,
    collection: String,
}

impl ProgressCursor {
    pub fn new(store: Arc<dyn ConversationStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Persisted count of the collection. Not retried: a store that is
    /// unreachable here aborts the run.
    pub async fn current_count(&self) -> Result<u64, SchedulerError> {
        match self.store.count(&self.collection).await {
            Ok(count) => {
                tracing::info!(collection = %self.collection, count, "Existing records found");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(collection = %self.collection, error = %e, "Could not read record count");
                Err(SchedulerError::StoreUnreachable(e))
            }
        }
    }
}
