use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub conversation: ConversationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub max_history: usize,
    pub persisted_history: usize,
    pub min_query_len: usize,
    pub max_query_len: usize,
    pub result_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub dir: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// Load `config/{CONFIG_ENV}.toml` (optional) layered under `APP__*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .set_default("api.base_url", "http://127.0.0.1:8000/api")?
            .set_default("api.timeout_secs", 30_i64)?
            .set_default("api.max_retries", 2_i64)?
            .set_default("api.retry_base_delay_ms", 500_i64)?
            .set_default("api.retry_max_delay_ms", 4000_i64)?
            .set_default("conversation.max_history", 50_i64)?
            .set_default("conversation.persisted_history", 20_i64)?
            .set_default("conversation.min_query_len", 3_i64)?
            .set_default("conversation.max_query_len", 500_i64)?
            .set_default("conversation.result_limit", 5_i64)?
            .set_default("storage.backend", "file")?
            .set_default("storage.dir", "./.ragchat")?
            .set_default("storage.key", "chat_history")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 4000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            persisted_history: 20,
            min_query_len: 3,
            max_query_len: 500,
            result_limit: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            dir: PathBuf::from("./.ragchat"),
            key: "chat_history".to_string(),
        }
    }
}
