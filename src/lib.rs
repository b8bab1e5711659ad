//! ragchat - terminal client for a RAG product-search backend
//!
//! The crate has two cooperating halves:
//! - [`core`]: the query gateway ([`RagClient`]) with retry, error
//!   normalization and product display helpers
//! - [`conversation`]: the [`ConversationController`] owning the message log,
//!   the pending flag and the persisted history window
//!
//! Everything is constructed explicitly from [`Settings`]; there is no global
//! client.

pub mod cli;
pub mod config;
pub mod conversation;
pub mod core;
pub mod storage;
pub mod utils;

pub use crate::config::Settings;
pub use crate::conversation::{ConversationController, ConversationEvent, Message, Role, SendOutcome};
pub use crate::core::{GatewayError, QueryGateway, RagClient};
pub use crate::storage::HistoryStore;
