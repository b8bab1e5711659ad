//! SQLite History Storage
//!
//! One row per key; the message sequence is stored as a JSON payload and
//! replaced wholesale. rusqlite is blocking, so every call hops onto the
//! blocking pool.

use super::HistoryStore;
use crate::conversation::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(path: PathBuf) -> Result<Self> {
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
            }
            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open history database: {:?}", path))?;
            Self::init(&conn)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .context("Failed to create history table")?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("History database lock poisoned"))?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn save(&self, key: &str, history: &[Message]) -> Result<()> {
        let payload = serde_json::to_string(history).context("Failed to serialize chat history")?;
        let key = key.to_string();
        let count = history.len();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO history (key, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                params![key, payload, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!("[SqliteStore] Saved {} messages under '{}'", count, key);
            Ok(())
        })
        .await
    }

    async fn load(&self, key: &str) -> Result<Vec<Message>> {
        let key = key.to_string();
        let payload: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT payload FROM history WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match payload {
            Some(json) => {
                let history: Vec<Message> =
                    serde_json::from_str(&json).context("Failed to deserialize chat history")?;
                tracing::debug!("[SqliteStore] Loaded {} messages", history.len());
                Ok(history)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM history WHERE key = ?1", params![key])?;
            tracing::debug!("[SqliteStore] Deleted '{}'", key);
            Ok(())
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM history WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_replace() {
        let store = SqliteStore::in_memory().unwrap();
        let first = vec![Message::new(1, Role::User, "Produtos até 100 reais")];
        let second = vec![
            Message::new(1, Role::User, "Produtos até 100 reais"),
            Message::new(2, Role::Assistant, "Encontrei 3 produtos").as_error(),
        ];

        store.save("chat_history", &first).await.unwrap();
        store.save("chat_history", &second).await.unwrap();

        assert_eq!(store.load("chat_history").await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load("chat_history").await.unwrap().is_empty());
        assert!(!store.exists("chat_history").await.unwrap());

        store
            .save("chat_history", &[Message::new(1, Role::User, "Teste")])
            .await
            .unwrap();
        assert!(store.exists("chat_history").await.unwrap());

        store.delete("chat_history").await.unwrap();
        assert!(!store.exists("chat_history").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("history.db");

        {
            let store = SqliteStore::open(path.clone()).await.unwrap();
            store
                .save("chat_history", &[Message::new(3, Role::System, "Olá")])
                .await
                .unwrap();
        }

        let store = SqliteStore::open(path).await.unwrap();
        let loaded = store.load("chat_history").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 3);
    }
}
