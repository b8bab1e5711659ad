//! Query gateway: HTTP client, wire models, error normalization, retry
//! policy and product display helpers.

pub mod client;
pub mod error;
pub mod models;
pub mod pricing;
pub mod retry;

pub use client::{QueryGateway, RagClient};
pub use error::GatewayError;
