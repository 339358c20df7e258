//! In-process document store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

use super::document::StoredConversation;
use super::store::{ConversationStore, RecordQuery, SortOrder};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    body: Value,
    created_at: DateTime<Utc>,
}

/// A [`ConversationStore`] kept in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bodies of a collection in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .map(|c| {
                c.get(collection)
                    .map(|entries| entries.iter().map(|e| e.body.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(collection).map_or(0, |e| e.len() as u64))
    }

    async fn insert_document(&self, collection: &str, mut body: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        if let Value::Object(map) = &mut body {
            map.insert("created_at".to_string(), serde_json::to_value(created_at)?);
        }

        let mut collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Entry {
                id: id.clone(),
                body,
                created_at,
            });
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredConversation>, StoreError> {
        let mut entries = {
            let collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
            collections.get(collection).cloned().unwrap_or_default()
        };
        if query.order == SortOrder::NewestFirst {
            entries.reverse();
        }

        let docs = entries.into_iter().filter_map(|entry| {
            StoredConversation::from_document(entry.id, &entry.body, Some(entry.created_at)).ok()
        });
        Ok(query.apply(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_count_query() {
        let store = MemoryStore::new();
        store
            .insert_document("c", json!({"goal": "a", "conversation": []}))
            .await
            .unwrap();
        store
            .insert_document("c", json!({"goal": "b", "test": true}))
            .await
            .unwrap();
        store
            .insert_document("c", json!({"goal": "c"}))
            .await
            .unwrap();

        assert_eq!(store.count("c").await.unwrap(), 3);
        assert_eq!(store.count("other").await.unwrap(), 0);

        let newest = store
            .query("c", &RecordQuery::training().with_order(SortOrder::NewestFirst))
            .await
            .unwrap();
        let goals: Vec<_> = newest.iter().filter_map(|d| d.goal.as_deref()).collect();
        assert_eq!(goals, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_created_at_written_into_body() {
        let store = MemoryStore::new();
        store.insert_document("c", json!({"goal": "a"})).await.unwrap();
        let docs = store.documents("c");
        assert!(docs[0].get("created_at").is_some());
    }
}
