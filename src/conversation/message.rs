use crate::core::models::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry of the conversation log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    pub timestamp: DateTime<Utc>,
    /// Placeholder written by clients that log a pending answer. Never
    /// appended here; such entries are dropped on restore.
    #[serde(default, skip_serializing_if = "is_false")]
    pub loading: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
    /// Backend processing time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Message {
    pub fn new(id: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            products: None,
            timestamp: Utc::now(),
            loading: false,
            error: false,
            processing_time: None,
        }
    }

    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = Some(products);
        self
    }

    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_time = Some(seconds);
        self
    }

    pub fn as_error(mut self) -> Self {
        self.error = true;
        self
    }

    pub fn products(&self) -> &[Product] {
        self.products.as_deref().unwrap_or_default()
    }
}

/// Hands out strictly increasing ids, clock-based so they stay unique across
/// restarts.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    /// Largest id a millisecond clock can produce.
    pub(crate) const MAX_ID: u64 = i64::MAX as u64;

    /// Whether a restored id can be continued from.
    pub(crate) fn accepts(id: u64) -> bool {
        id <= Self::MAX_ID
    }

    pub(crate) fn seeded(last: u64) -> Self {
        Self { last }
    }

    pub(crate) fn next(&mut self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}
