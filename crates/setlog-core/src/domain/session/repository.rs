//! Session state repositories

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::trace;

use super::repository_trait::SnapshotStore;
use crate::error::Result;

/// SQLite-backed store over the `session_state` table
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// List every stored key with its value, ordered by key
    pub async fn entries(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM session_state ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM session_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        trace!(key, bytes = value.len(), "Stored session key");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-process store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn sqlite_store() -> SqliteSnapshotStore {
        let db = Database::in_memory().await.unwrap();
        SqliteSnapshotStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_sqlite_set_get_remove() {
        let store = sqlite_store().await;

        assert_eq!(store.get("session.active").await.unwrap(), None);

        store.set("session.active", "true").await.unwrap();
        assert_eq!(store.get("session.active").await.unwrap().as_deref(), Some("true"));

        store.remove("session.active").await.unwrap();
        assert_eq!(store.get("session.active").await.unwrap(), None);

        // Removing twice is fine
        store.remove("session.active").await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_last_writer_wins() {
        let store = sqlite_store().await;

        store.set("session.workoutName", "Push").await.unwrap();
        store.set("session.workoutName", "Pull").await.unwrap();

        assert_eq!(
            store.get("session.workoutName").await.unwrap().as_deref(),
            Some("Pull")
        );
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_shared_between_clones() {
        let store = MemorySnapshotStore::new();
        let other = store.clone();

        store.set("k", "v").await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(other.len(), 1);

        other.remove("k").await.unwrap();
        assert!(store.is_empty());
    }
}
