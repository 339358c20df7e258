//! SQLite-backed document store.
//!
//! Documents are JSON text in a single `documents` table, partitioned by
//! collection name.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StoreError;

use super::document::StoredConversation;
use super::store::{ConversationStore, RecordQuery, SortOrder};

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://dialogue_forge.db";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT    PRIMARY KEY,
    collection  TEXT    NOT NULL,
    body        TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, created_at);
"#;

/// Document store on a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and create if missing) the database at `url`.
    ///
    /// Accepts `sqlite://<path>` and `sqlite::memory:`. In-memory databases
    /// are limited to one connection so every query sees the same data.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut opts = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true);
        if !in_memory {
            opts = opts
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool = pool_options(in_memory)
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        tracing::info!(url = url, "Document store opened");
        Ok(Self { pool })
    }

    /// Open a database file by path.
    pub async fn open_path(path: &std::path::Path) -> Result<Self, StoreError> {
        Self::open(&format!("sqlite://{}", path.display())).await
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// An in-memory database lives only as long as its single connection, so
/// that connection is never retired.
fn pool_options(in_memory: bool) -> SqlitePoolOptions {
    if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn insert_document(&self, collection: &str, mut body: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = format_timestamp(Utc::now());
        if let Value::Object(map) = &mut body {
            map.insert("created_at".to_string(), Value::String(created_at.clone()));
        }

        sqlx::query(
            "INSERT INTO documents (id, collection, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id)
        .bind(collection)
        .bind(serde_json::to_string(&body)?)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(collection = collection, id = %id, "Document inserted");
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredConversation>, StoreError> {
        let sql = match query.order {
            SortOrder::OldestFirst => {
                "SELECT id, body, created_at FROM documents WHERE collection = ?1 \
                 ORDER BY created_at ASC, rowid ASC"
            }
            SortOrder::NewestFirst => {
                "SELECT id, body, created_at FROM documents WHERE collection = ?1 \
                 ORDER BY created_at DESC, rowid DESC"
            }
        };

        let rows = sqlx::query(sql)
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let docs = rows.into_iter().filter_map(|row| {
            let id: String = row.get("id");
            let raw: String = row.get("body");
            let stored_at = DateTime::parse_from_rfc3339(row.get::<&str, _>("created_at"))
                .ok()
                .map(|dt| dt.with_timezone(&Utc));

            let parsed = serde_json::from_str::<Value>(&raw)
                .and_then(|body| StoredConversation::from_document(id.clone(), &body, stored_at));
            match parsed {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping unreadable document");
                    None
                }
            }
        });

        Ok(query.apply(docs))
    }
}
