//! Conversation state: the message log, its lifecycle and persistence.

pub mod controller;
pub mod message;

pub use controller::{
    Canceller, ConversationController, ConversationEvent, InputError, Interrupt, SendOutcome,
    SUGGESTIONS,
};
pub use message::{Message, Role};
