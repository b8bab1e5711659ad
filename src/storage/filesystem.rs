//! File System History Storage
//!
//! Information Hiding:
//! - File paths and JSON format hidden from users
//! - Each key is one file: {base_path}/{key}.json, rewritten on every save

use super::HistoryStore;
use crate::conversation::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .context("Failed to create storage directory")?;

        Ok(Self { base_path })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

#[async_trait]
impl HistoryStore for FileSystemStore {
    async fn save(&self, key: &str, history: &[Message]) -> Result<()> {
        let path = self.key_path(key);
        let json = serde_json::to_string_pretty(history)
            .context("Failed to serialize chat history")?;

        // Atomic replace: write a sibling file, then rename over the old one.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write history file: {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace history file: {:?}", path))?;

        tracing::debug!(
            "[FileSystemStore] Saved {} messages under '{}' to {:?}",
            history.len(),
            key,
            path
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<Message>> {
        let path = self.key_path(key);

        if !path.exists() {
            tracing::debug!("[FileSystemStore] '{}' does not exist", key);
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read history file: {:?}", path))?;

        let history: Vec<Message> =
            serde_json::from_str(&json).context("Failed to deserialize chat history")?;

        tracing::debug!(
            "[FileSystemStore] Loaded {} messages from '{}' at {:?}",
            history.len(),
            key,
            path
        );
        Ok(history)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);

        if path.exists() {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete history file: {:?}", path))?;
            tracing::debug!("[FileSystemStore] Deleted '{}' at {:?}", key, path);
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key).exists())
    }
}
