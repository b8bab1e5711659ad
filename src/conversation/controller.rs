//! Conversation Controller - message log and query lifecycle
//!
//! Information Hiding:
//! - Gateway and storage backends hidden behind traits
//! - Input validation, history bounds and persistence internalized
//! - Gateway failures turned into log entries; nothing propagates to callers

use super::message::{IdGenerator, Message, Role};
use crate::config::ConversationConfig;
use crate::core::error::GatewayError;
use crate::core::models::Product;
use crate::core::QueryGateway;
use crate::storage::HistoryStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Starter prompts shown while the log is empty.
pub const SUGGESTIONS: [&str; 4] = [
    "Quero uma sandália confortável",
    "Produtos em promoção",
    "Tênis para corrida",
    "Produtos até 100 reais",
];

/// Notifications for whatever is rendering the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    MessageAppended(u64),
    PendingChanged(bool),
    ScrollToBottom,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Please type at least {min} characters.")]
    TooShort { min: usize, len: usize },

    #[error("Your message is too long ({len} characters). The limit is {max}.")]
    TooLong { max: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Assistant answer appended.
    Answered,
    /// Error-flagged assistant message appended.
    Failed(GatewayError),
    /// Validation failed; a warning was appended and no request was made.
    Rejected(InputError),
    /// A query is already in flight; nothing was appended.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    CancelledQuery,
    Shutdown,
}

/// Cancels whichever query is currently in flight. Cheap to clone and safe
/// to hand to another task (e.g. a Ctrl+C handler).
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Canceller {
    /// Returns `true` if there was something to cancel.
    pub fn cancel(&self) -> bool {
        match self.current.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Ctrl+C semantics: cancel the query in flight, or request shutdown
    /// through `shutdown` when there is none.
    pub fn interrupt(&self, shutdown: &CancellationToken) -> Interrupt {
        if self.cancel() {
            Interrupt::CancelledQuery
        } else {
            shutdown.cancel();
            Interrupt::Shutdown
        }
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(token.clone());
        }
        token
    }

    fn disarm(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }
}

pub struct ConversationController {
    gateway: Arc<dyn QueryGateway>,
    store: Arc<dyn HistoryStore>,
    storage_key: String,
    config: ConversationConfig,
    messages: VecDeque<Message>,
    pending: bool,
    ids: IdGenerator,
    events: Option<UnboundedSender<ConversationEvent>>,
    canceller: Canceller,
}

impl ConversationController {
    /// Create a controller and rehydrate the persisted window from `store`.
    pub async fn new(
        gateway: Arc<dyn QueryGateway>,
        store: Arc<dyn HistoryStore>,
        storage_key: impl Into<String>,
        config: ConversationConfig,
    ) -> Self {
        let storage_key = storage_key.into();

        let mut restored = match store.load(&storage_key).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("[Conversation] Could not restore history: {:#}", e);
                Vec::new()
            }
        };
        let before = restored.len();
        restored.retain(|m| !m.loading && IdGenerator::accepts(m.id));
        if restored.len() < before {
            tracing::warn!(
                "[Conversation] Dropped {} restored messages (stale placeholders or out-of-range ids)",
                before - restored.len()
            );
        }

        let keep = config.persisted_history.min(config.max_history);
        if restored.len() > keep {
            restored.drain(..restored.len() - keep);
        }

        let last_id = restored.iter().map(|m| m.id).max().unwrap_or(0);
        tracing::info!("[Conversation] Restored {} messages", restored.len());

        Self {
            gateway,
            store,
            storage_key,
            config,
            messages: restored.into(),
            pending: false,
            ids: IdGenerator::seeded(last_id),
            events: None,
            canceller: Canceller::default(),
        }
    }

    /// Receive UI notifications. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ConversationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn messages(&self) -> &VecDeque<Message> {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn show_welcome(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        &SUGGESTIONS
    }

    /// Whether the send action should be enabled for `input`.
    pub fn can_send(&self, input: &str) -> bool {
        !self.pending && !input.trim().is_empty()
    }

    fn normalize(input: &str) -> String {
        WHITESPACE.replace_all(input.trim(), " ").into_owned()
    }

    fn validate(&self, input: &str) -> Result<String, InputError> {
        let text = Self::normalize(input);
        let len = text.chars().count();

        if len < self.config.min_query_len {
            return Err(InputError::TooShort {
                min: self.config.min_query_len,
                len,
            });
        }
        if len > self.config.max_query_len {
            return Err(InputError::TooLong {
                max: self.config.max_query_len,
                len,
            });
        }
        Ok(text)
    }

    /// Submit a user query through validation, the gateway and the log.
    pub async fn send(&mut self, input: &str) -> SendOutcome {
        if self.pending {
            tracing::debug!("[Conversation] Ignoring input while a query is pending");
            return SendOutcome::Busy;
        }

        let text = match self.validate(input) {
            Ok(text) => text,
            Err(reason) => {
                tracing::debug!("[Conversation] Rejected input: {}", reason);
                let id = self.ids.next();
                self.append(Message::new(id, Role::System, reason.to_string()))
                    .await;
                return SendOutcome::Rejected(reason);
            }
        };

        let id = self.ids.next();
        self.append(Message::new(id, Role::User, text.clone())).await;
        self.set_pending(true);

        let gateway = Arc::clone(&self.gateway);
        let token = self.canceller.arm();
        let limit = self.config.result_limit;

        let result = tokio::select! {
            _ = token.cancelled() => Err(GatewayError::Cancelled),
            response = gateway.query(&text, Some(limit)) => response,
        };
        self.canceller.disarm();

        let outcome = match result {
            Ok(response) => {
                let id = self.ids.next();
                let message = Message::new(id, Role::Assistant, response.answer)
                    .with_products(response.products)
                    .with_processing_time(response.processing_time);
                self.append(message).await;
                SendOutcome::Answered
            }
            Err(err) => {
                tracing::warn!("[Conversation] Query failed: {}", err);
                let id = self.ids.next();
                let message = Message::new(id, Role::Assistant, failure_text(&err)).as_error();
                self.append(message).await;
                SendOutcome::Failed(err)
            }
        };

        self.set_pending(false);
        outcome
    }

    /// Fetch the full record for a product and show it in the log.
    pub async fn view_details(&mut self, product_id: u64) -> Option<Product> {
        let result = self.gateway.get_product(product_id).await;
        match result {
            Ok(product) => {
                let id = self.ids.next();
                let message = Message::new(id, Role::System, format!("Details for {}", product.name))
                    .with_products(vec![product.clone()]);
                self.append(message).await;
                Some(product)
            }
            Err(err) => {
                tracing::warn!("[Conversation] Could not load product {}: {}", product_id, err);
                let id = self.ids.next();
                let message = Message::new(
                    id,
                    Role::Assistant,
                    format!("Could not load product {}: {}", product_id, err),
                )
                .as_error();
                self.append(message).await;
                None
            }
        }
    }

    /// Ask for products resembling `product` via the normal query pipeline.
    pub async fn find_similar(&mut self, product: &Product) -> SendOutcome {
        let query = format!(
            "Produtos similares a {} na categoria {}",
            product.name, product.category
        );
        self.send(&query).await
    }

    /// Local confirmation only; there is no cart on the backend.
    pub async fn add_to_cart(&mut self, product: &Product) {
        let id = self.ids.next();
        self.append(Message::new(
            id,
            Role::System,
            format!("{} added to cart.", product.name),
        ))
        .await;
    }

    /// Drop the in-memory log and the persisted window.
    pub async fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.store.delete(&self.storage_key).await {
            tracing::warn!("[Conversation] Could not clear stored history: {:#}", e);
        }
        tracing::info!("[Conversation] History cleared");
        self.emit(ConversationEvent::Cleared);
    }

    async fn append(&mut self, message: Message) {
        let id = message.id;
        self.messages.push_back(message);
        while self.messages.len() > self.config.max_history {
            self.messages.pop_front();
        }

        self.persist().await;
        self.emit(ConversationEvent::MessageAppended(id));
        self.emit(ConversationEvent::ScrollToBottom);
    }

    async fn persist(&self) {
        let skip = self
            .messages
            .len()
            .saturating_sub(self.config.persisted_history);
        let window: Vec<Message> = self.messages.iter().skip(skip).cloned().collect();

        if let Err(e) = self.store.save(&self.storage_key, &window).await {
            tracing::warn!("[Conversation] Could not persist history: {:#}", e);
        }
    }

    fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
        self.emit(ConversationEvent::PendingChanged(pending));
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn failure_text(err: &GatewayError) -> String {
    if matches!(err, GatewayError::Cancelled) {
        "The request was cancelled.".to_string()
    } else if err.is_timeout() {
        "The search took too long to respond. Please try again in a moment.".to_string()
    } else if err.is_unavailable() {
        "The product search service is unavailable right now. Please check that the backend is running and try again.".to_string()
    } else {
        format!("Sorry, I couldn't process your message. ({})", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::RagResponse;
    use crate::storage::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<RagResponse, GatewayError>>>,
        queries: Mutex<Vec<String>>,
        lookups: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedGateway {
        fn replying(replies: Vec<Result<RagResponse, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl QueryGateway for ScriptedGateway {
        async fn query(&self, text: &str, _limit: Option<u32>) -> Result<RagResponse, GatewayError> {
            self.queries.lock().unwrap().push(text.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(answer("ok")))
        }

        async fn get_product(&self, id: u64) -> Result<Product, GatewayError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if id == 404 {
                Err(GatewayError::Http {
                    status: 404,
                    message: "Not found.".into(),
                })
            } else {
                Ok(product(id))
            }
        }
    }

    fn product(id: u64) -> Product {
        Product {
            id,
            name: format!("Produto {}", id),
            category: "Calçados".to_string(),
            price: 100.0,
            stock: 5,
            ..Default::default()
        }
    }

    fn answer(text: &str) -> RagResponse {
        RagResponse {
            query: "q".to_string(),
            answer: text.to_string(),
            match_count: 1,
            products: vec![product(1)],
            processing_time: 0.5,
        }
    }

    fn config(max_history: usize, persisted_history: usize) -> ConversationConfig {
        ConversationConfig {
            max_history,
            persisted_history,
            ..ConversationConfig::default()
        }
    }

    async fn controller(
        gateway: Arc<ScriptedGateway>,
        store: Arc<InMemoryStore>,
        config: ConversationConfig,
    ) -> ConversationController {
        ConversationController::new(gateway, store, "chat_history", config).await
    }

    #[tokio::test]
    async fn test_short_and_long_input_rejected_without_calls() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway.clone(), Arc::new(InMemoryStore::new()), config(50, 20)).await;

        let outcome = chat.send("oi").await;
        assert!(matches!(outcome, SendOutcome::Rejected(InputError::TooShort { .. })));

        let outcome = chat.send(&"a".repeat(501)).await;
        assert!(matches!(outcome, SendOutcome::Rejected(InputError::TooLong { .. })));

        let outcome = chat.send("   ").await;
        assert!(matches!(outcome, SendOutcome::Rejected(_)));

        assert_eq!(gateway.query_count(), 0);
        assert_eq!(chat.message_count(), 3);
        assert!(chat.messages().iter().all(|m| m.role == Role::System));
    }

    #[tokio::test]
    async fn test_length_bounds_are_inclusive() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway.clone(), Arc::new(InMemoryStore::new()), config(50, 20)).await;

        assert_eq!(chat.send("abc").await, SendOutcome::Answered);
        assert_eq!(chat.send(&"é".repeat(500)).await, SendOutcome::Answered);
        assert_eq!(gateway.query_count(), 2);
    }

    #[tokio::test]
    async fn test_whitespace_is_collapsed_before_sending() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway.clone(), Arc::new(InMemoryStore::new()), config(50, 20)).await;

        chat.send("  tênis \n  para   corrida ").await;
        assert_eq!(gateway.queries.lock().unwrap()[0], "tênis para corrida");
    }

    #[tokio::test]
    async fn test_success_appends_user_then_assistant() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![Ok(answer("Encontrei 1 produto."))]));
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(50, 20)).await;

        assert_eq!(chat.send("Tênis para corrida").await, SendOutcome::Answered);
        assert!(!chat.is_pending());

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Encontrei 1 produto.");
        assert_eq!(messages[1].products().len(), 1);
        assert_eq!(messages[1].processing_time, Some(0.5));
        assert!(!messages[1].error);
        assert!(messages[0].id < messages[1].id);
    }

    #[tokio::test]
    async fn test_failures_append_error_message() {
        let gateway = Arc::new(ScriptedGateway::replying(vec![
            Err(GatewayError::Network("connection refused".into())),
            Err(GatewayError::Timeout),
            Err(GatewayError::Http {
                status: 400,
                message: "limit too high".into(),
            }),
        ]));
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(50, 20)).await;

        for _ in 0..3 {
            assert!(matches!(chat.send("Produtos em promoção").await, SendOutcome::Failed(_)));
            assert!(!chat.is_pending());
        }

        let errors: Vec<&Message> = chat.messages().iter().filter(|m| m.error).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|m| m.role == Role::Assistant));
        assert!(errors[0].content.contains("unavailable"));
        assert!(errors[1].content.contains("too long"));
        assert!(errors[2].content.contains("HTTP 400: limit too high"));
        assert_eq!(chat.message_count(), 6);
    }

    #[tokio::test]
    async fn test_log_evicts_oldest_first() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(5, 3)).await;

        for i in 0..4 {
            chat.send(&format!("pergunta {}", i)).await;
        }

        assert_eq!(chat.message_count(), 5);
        let first = chat.messages().front().unwrap();
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(chat.messages()[1].content, "pergunta 2");
    }

    #[tokio::test]
    async fn test_persisted_window_restored_on_startup() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::default());

        let expected: Vec<Message> = {
            let mut chat = controller(gateway.clone(), store.clone(), config(50, 4)).await;
            for i in 0..3 {
                chat.send(&format!("pergunta {}", i)).await;
            }
            chat.messages().iter().skip(2).cloned().collect()
        };

        let stored = store.load("chat_history").await.unwrap();
        assert_eq!(stored, expected);

        let mut chat = controller(gateway, store, config(50, 4)).await;
        let restored: Vec<Message> = chat.messages().iter().cloned().collect();
        assert_eq!(restored, expected);

        chat.add_to_cart(&product(2)).await;
        assert!(chat.messages().back().unwrap().id > expected.last().unwrap().id);
    }

    #[tokio::test]
    async fn test_clear_empties_log_and_store() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway.clone(), store.clone(), config(50, 20)).await;

        chat.send("Produtos até 100 reais").await;
        assert!(!chat.show_welcome());

        chat.clear().await;
        assert!(chat.show_welcome());
        assert!(!store.exists("chat_history").await.unwrap());

        let chat = controller(gateway, store, config(50, 20)).await;
        assert_eq!(chat.message_count(), 0);
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(50, 20)).await;
        let mut events = chat.subscribe();

        chat.send("Tênis para corrida").await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(
            seen,
            vec![
                ConversationEvent::MessageAppended(ids[0]),
                ConversationEvent::ScrollToBottom,
                ConversationEvent::PendingChanged(true),
                ConversationEvent::MessageAppended(ids[1]),
                ConversationEvent::ScrollToBottom,
                ConversationEvent::PendingChanged(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_in_flight_query() {
        let gateway = Arc::new(ScriptedGateway {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(50, 20)).await;
        let canceller = chat.canceller();
        assert!(!canceller.cancel());

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel()
        });

        let outcome = chat.send("Tênis para corrida").await;
        assert!(handle.await.unwrap());
        assert_eq!(outcome, SendOutcome::Failed(GatewayError::Cancelled));
        assert!(!chat.is_pending());
        assert!(chat.messages().back().unwrap().content.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_interrupt_shuts_down_when_idle() {
        let gateway = Arc::new(ScriptedGateway {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let mut chat = controller(gateway, Arc::new(InMemoryStore::new()), config(50, 20)).await;
        let canceller = chat.canceller();
        let shutdown = CancellationToken::new();

        let in_flight = {
            let canceller = canceller.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                canceller.interrupt(&shutdown)
            })
        };
        chat.send("Tênis para corrida").await;
        assert_eq!(in_flight.await.unwrap(), Interrupt::CancelledQuery);
        assert!(!shutdown.is_cancelled());

        assert_eq!(canceller.interrupt(&shutdown), Interrupt::Shutdown);
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_restore_skips_unusable_messages() {
        let store = Arc::new(InMemoryStore::new());
        let kept = Message::new(10, Role::User, "Produtos em promoção");
        let mut placeholder = Message::new(11, Role::Assistant, "");
        placeholder.loading = true;
        let hostile = Message::new(u64::MAX, Role::User, "id fora do intervalo");
        store
            .save("chat_history", &[kept.clone(), placeholder, hostile])
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway, store, config(50, 20)).await;
        assert_eq!(chat.messages().iter().cloned().collect::<Vec<_>>(), vec![kept]);

        assert!(matches!(chat.send("a").await, SendOutcome::Rejected(_)));
        assert_eq!(chat.send("Tênis para corrida").await, SendOutcome::Answered);

        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_auxiliary_actions() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut chat = controller(gateway.clone(), Arc::new(InMemoryStore::new()), config(50, 20)).await;

        let details = chat.view_details(7).await;
        assert_eq!(details.map(|p| p.id), Some(7));
        assert_eq!(chat.messages().back().unwrap().products()[0].id, 7);

        assert!(chat.view_details(404).await.is_none());
        assert!(chat.messages().back().unwrap().error);
        assert_eq!(gateway.lookups.load(Ordering::SeqCst), 2);

        chat.add_to_cart(&product(3)).await;
        assert_eq!(chat.messages().back().unwrap().content, "Produto 3 added to cart.");
        assert_eq!(gateway.query_count(), 0);

        assert_eq!(chat.find_similar(&product(3)).await, SendOutcome::Answered);
        let sent = gateway.queries.lock().unwrap()[0].clone();
        assert!(sent.contains("Produto 3"));
        assert!(sent.contains("Calçados"));
    }
}
