//! Chat History Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend hidden behind trait
//! - Swap between memory, JSON files and SQLite without touching the controller
//! - Every write replaces the stored sequence wholesale

use crate::config::{StorageBackend, StorageConfig};
use crate::conversation::Message;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod filesystem;
pub mod memory;
pub mod sqlite;

/// Key-value store holding one ordered message sequence per key
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Replace whatever is stored under `key`
    async fn save(&self, key: &str, history: &[Message]) -> Result<()>;

    /// Returns an empty vector if nothing is stored under `key`
    async fn load(&self, key: &str) -> Result<Vec<Message>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(!self.load(key).await?.is_empty())
    }
}

/// Build the backend selected in settings.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn HistoryStore>> {
    let store: Arc<dyn HistoryStore> = match config.backend {
        StorageBackend::Memory => Arc::new(memory::InMemoryStore::new()),
        StorageBackend::File => Arc::new(filesystem::FileSystemStore::new(config.dir.clone()).await?),
        StorageBackend::Sqlite => {
            Arc::new(sqlite::SqliteStore::open(config.dir.join("history.db")).await?)
        }
    };
    Ok(store)
}
