//! RAG backend client (the query gateway)
//!
//! Information Hiding:
//! - URL layout and query-string encoding hidden behind typed operations
//! - Retry applied to idempotent reads only, never to mutations
//! - reqwest errors and error bodies normalized into `GatewayError`

use super::error::GatewayError;
use super::models::*;
use super::retry::RetryPolicy;
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_QUERY_LIMIT: u32 = 5;
pub const MAX_QUERY_LIMIT: u32 = 20;

/// The slice of the gateway the conversation controller depends on.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn query(&self, text: &str, limit: Option<u32>) -> Result<RagResponse, GatewayError>;

    async fn get_product(&self, id: u64) -> Result<Product, GatewayError>;
}

pub struct RagClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl RagClient {
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
            timeout: config.timeout(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Origin of the API host; uploaded images are served relative to it.
    pub fn media_base(&self) -> String {
        match Url::parse(&self.base_url) {
            Ok(mut url) => {
                url.set_path("");
                url.set_query(None);
                url.as_str().trim_end_matches('/').to_string()
            }
            Err(_) => self.base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn product_url(&self, id: u64) -> String {
        self.url(&format!("/rag/produtos/{}/", id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[RagClient] Backend returned {}: {}", status, body);
            return Err(GatewayError::from_response(status, &body));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Idempotent call: retried under the configured policy. The timeout
    /// budget covers every attempt, not each one.
    async fn read<T, B>(&self, label: &str, build: B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Fn() -> RequestBuilder + Send + Sync,
    {
        tracing::debug!("[RagClient] {}", label);
        let build = &build;
        let attempts = self.retry.run(label, move || self.send_json::<T>(build()));

        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "[RagClient] {} exceeded {}s budget",
                    label,
                    self.timeout.as_secs_f64()
                );
                Err(GatewayError::Timeout)
            }
        }
    }

    fn check_query(text: &str, limit: Option<u32>) -> Result<(), GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::InvalidInput("query text is empty".to_string()));
        }
        if let Some(limit) = limit {
            if limit == 0 || limit > MAX_QUERY_LIMIT {
                return Err(GatewayError::InvalidInput(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_QUERY_LIMIT, limit
                )));
            }
        }
        Ok(())
    }

    pub async fn query(&self, text: &str, limit: Option<u32>) -> Result<RagResponse, GatewayError> {
        Self::check_query(text, limit)?;
        let body = RagQuery {
            query: text.trim().to_string(),
            limit: Some(limit.unwrap_or(DEFAULT_QUERY_LIMIT)),
        };
        let url = self.url("/rag/query/");

        let response: RagResponse = self
            .read("POST /rag/query/", || self.client.post(&url).json(&body))
            .await?;

        tracing::info!(
            "[RagClient] Query answered with {} products in {:.3}s",
            response.products.len(),
            response.processing_time
        );
        Ok(response)
    }

    pub async fn search(&self, text: &str, limit: Option<u32>) -> Result<SearchResponse, GatewayError> {
        Self::check_query(text, limit)?;
        let url = self.url("/rag/search/");
        let params = [
            ("q", text.trim().to_string()),
            ("limit", limit.unwrap_or(DEFAULT_QUERY_LIMIT).to_string()),
        ];

        self.read("GET /rag/search/", || self.client.get(&url).query(&params))
            .await
    }

    pub async fn stats(&self) -> Result<RagStats, GatewayError> {
        let url = self.url("/rag/stats/");
        self.read("GET /rag/stats/", || self.client.get(&url)).await
    }

    pub async fn list_products(
        &self,
        filters: &ProductFilters,
    ) -> Result<Paginated<Product>, GatewayError> {
        let url = self.url("/rag/produtos/");
        let params = filters.to_query_pairs();

        self.read("GET /rag/produtos/", || self.client.get(&url).query(&params))
            .await
    }

    pub async fn get_product(&self, id: u64) -> Result<Product, GatewayError> {
        let url = self.product_url(id);
        self.read("GET /rag/produtos/{id}/", || self.client.get(&url)).await
    }

    pub async fn create_product(&self, product: &Product) -> Result<Product, GatewayError> {
        tracing::info!("[RagClient] Creating product '{}'", product.name);
        self.send_json(self.client.post(self.url("/rag/produtos/")).json(product))
            .await
    }

    /// Full replace.
    pub async fn update_product(&self, id: u64, product: &Product) -> Result<Product, GatewayError> {
        tracing::info!("[RagClient] Replacing product {}", id);
        self.send_json(self.client.put(self.product_url(id)).json(product))
            .await
    }

    /// Partial update; only the fields present in `changes` are touched.
    pub async fn patch_product<P: Serialize + ?Sized>(
        &self,
        id: u64,
        changes: &P,
    ) -> Result<Product, GatewayError> {
        tracing::info!("[RagClient] Patching product {}", id);
        self.send_json(self.client.patch(self.product_url(id)).json(changes))
            .await
    }

    pub async fn delete_product(&self, id: u64) -> Result<(), GatewayError> {
        tracing::info!("[RagClient] Deleting product {}", id);
        self.send(self.client.delete(self.product_url(id))).await?;
        Ok(())
    }

    pub async fn upload_image(
        &self,
        id: u64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImageUpload, GatewayError> {
        tracing::info!(
            "[RagClient] Uploading image '{}' ({} bytes) for product {}",
            file_name,
            bytes.len(),
            id
        );
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))?;
        let form = Form::new().part("imagem", part);

        self.send_json(self.client.post(self.image_url(id)).multipart(form))
            .await
    }

    /// Point the product at an externally hosted image instead of uploading.
    pub async fn set_image_url(&self, id: u64, image_url: &str) -> Result<ImageUpload, GatewayError> {
        let body = serde_json::json!({ "imagem_url": image_url });
        self.send_json(self.client.patch(self.image_url(id)).json(&body))
            .await
    }

    fn image_url(&self, id: u64) -> String {
        self.url(&format!("/rag/produtos/{}/imagem/", id))
    }

    pub async fn product_stats(&self) -> Result<ProductStats, GatewayError> {
        let url = self.url("/rag/produtos/estatisticas/");
        self.read("GET /rag/produtos/estatisticas/", || self.client.get(&url))
            .await
    }

    pub async fn health_check(&self) -> Result<HealthStatus, GatewayError> {
        let url = self.url("/health/");
        self.read("GET /health/", || self.client.get(&url)).await
    }
}

fn image_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl QueryGateway for RagClient {
    async fn query(&self, text: &str, limit: Option<u32>) -> Result<RagResponse, GatewayError> {
        RagClient::query(self, text, limit).await
    }

    async fn get_product(&self, id: u64) -> Result<Product, GatewayError> {
        RagClient::get_product(self, id).await
    }
}
