//! Repository trait for live session state
//!
//! The session persists itself as single-slot string keys. The trait
//! abstracts over where those keys live (SQLite, in-process map).

use async_trait::async_trait;

use crate::error::Result;

/// Key/value store for the durable session keys
///
/// Writes are last-writer-wins per key.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read a key, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}
