//! In-Memory History Storage
//!
//! Suitable for tests and throwaway sessions; data is lost on exit.

use super::HistoryStore;
use crate::conversation::Message;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn save(&self, key: &str, history: &[Message]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), history.to_vec());
        tracing::debug!("[InMemoryStore] Saved {} messages under '{}'", history.len(), key);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<Message>> {
        let entries = self.entries.read().await;
        let history = entries.get(key).cloned().unwrap_or_default();
        tracing::debug!("[InMemoryStore] Loaded {} messages from '{}'", history.len(), key);
        Ok(history)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        tracing::debug!("[InMemoryStore] Deleted '{}'", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[tokio::test]
    async fn test_save_replaces_previous_value() {
        let store = InMemoryStore::new();
        let first = vec![Message::new(1, Role::User, "Olá")];
        let second = vec![
            Message::new(2, Role::User, "Tênis para corrida"),
            Message::new(3, Role::Assistant, "Aqui estão algumas opções"),
        ];

        store.save("chat_history", &first).await.unwrap();
        store.save("chat_history", &second).await.unwrap();

        let loaded = store.load("chat_history").await.unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_load_missing_key() {
        let store = InMemoryStore::new();
        assert!(store.load("nothing").await.unwrap().is_empty());
        assert!(!store.exists("nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        store
            .save("chat_history", &[Message::new(1, Role::User, "Teste")])
            .await
            .unwrap();
        assert!(store.exists("chat_history").await.unwrap());

        store.delete("chat_history").await.unwrap();
        assert!(!store.exists("chat_history").await.unwrap());
    }
}
