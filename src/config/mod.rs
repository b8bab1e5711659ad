mod settings;

pub use settings::{
    ApiConfig, ConversationConfig, LoggingConfig, Settings, StorageBackend, StorageConfig,
};
