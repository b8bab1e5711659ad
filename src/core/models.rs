//! Wire types for the RAG backend
//!
//! Field names on the wire follow the backend (Portuguese); the Rust side uses
//! English names with serde renames. The backend's "minimal", "list" and
//! "full" product shapes all decode into the same [`Product`] record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Canonical product record. Endpoints returning fewer fields leave the
/// optional ones as `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "subcategoria", default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(rename = "preco", deserialize_with = "de_decimal")]
    pub price: f64,
    #[serde(
        rename = "preco_promocional",
        default,
        deserialize_with = "de_opt_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub promo_price: Option<f64>,
    #[serde(rename = "marca", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(rename = "cor", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "tamanho", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(rename = "material", default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(rename = "estoque", default)]
    pub stock: u32,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "especificacoes", default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(
        rename = "avaliacao",
        default,
        deserialize_with = "de_opt_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<f64>,
    #[serde(rename = "num_avaliacoes", default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u32>,
    #[serde(
        rename = "peso",
        default,
        deserialize_with = "de_opt_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight_kg: Option<f64>,
    #[serde(rename = "dimensoes", default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(rename = "imagem", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "imagem_url", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "data_cadastro", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "data_atualizacao", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn is_zero(id: &u64) -> bool {
    *id == 0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Decimal::Number(n) => Ok(n),
            Decimal::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid decimal '{}'", s))),
        }
    }
}

// DRF serializes DecimalField as a string unless COERCE_DECIMAL_TO_STRING is off.
fn de_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Decimal::deserialize(deserializer)?.into_f64()
}

fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer)?
        .map(Decimal::into_f64)
        .transpose()
}

#[derive(Debug, Clone, Serialize)]
pub struct RagQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub query: String,
    #[serde(rename = "resposta")]
    pub answer: String,
    #[serde(rename = "produtos_encontrados", default)]
    pub match_count: u32,
    #[serde(rename = "produtos", default)]
    pub products: Vec<Product>,
    #[serde(rename = "tempo_processamento", default)]
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub total: u32,
    #[serde(rename = "produtos", default)]
    pub products: Vec<Product>,
    #[serde(rename = "tempo_processamento", default)]
    pub processing_time: f64,
}

/// DRF page envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Ordering accepted by the product listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    RatingAsc,
    RatingDesc,
    Oldest,
    Newest,
    StockAsc,
    StockDesc,
}

impl SortKey {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortKey::NameAsc => "nome",
            SortKey::NameDesc => "-nome",
            SortKey::PriceAsc => "preco",
            SortKey::PriceDesc => "-preco",
            SortKey::RatingAsc => "avaliacao",
            SortKey::RatingDesc => "-avaliacao",
            SortKey::Oldest => "data_cadastro",
            SortKey::Newest => "-data_cadastro",
            SortKey::StockAsc => "estoque",
            SortKey::StockDesc => "-estoque",
        }
    }
}

/// Filters for `GET /rag/produtos/`. Unset or blank fields are left out of
/// the query string entirely.
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub in_stock: Option<bool>,
    pub on_promotion: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<SortKey>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ProductFilters {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        let mut text = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((key, v.to_string()));
            }
        };
        text("categoria", &self.category);
        text("subcategoria", &self.subcategory);
        text("marca", &self.brand);
        text("cor", &self.color);
        text("tamanho", &self.size);
        text("search", &self.search);

        if let Some(min) = self.min_price {
            pairs.push(("preco_min", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("preco_max", max.to_string()));
        }
        if let Some(in_stock) = self.in_stock {
            pairs.push(("em_estoque", in_stock.to_string()));
        }
        if let Some(promo) = self.on_promotion {
            pairs.push(("em_promocao", promo.to_string()));
        }
        if let Some(ordering) = self.ordering {
            pairs.push(("ordering", ordering.as_param().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("page_size", page_size.to_string()));
        }

        pairs
    }
}

/// Aggregates from `/rag/stats/`. Unknown counters land in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagStats {
    #[serde(rename = "total_produtos", default)]
    pub total_products: Option<u64>,
    #[serde(rename = "produtos_com_embedding", default)]
    pub embedded_products: Option<u64>,
    #[serde(rename = "preco_minimo", default, deserialize_with = "de_opt_decimal")]
    pub min_price: Option<f64>,
    #[serde(rename = "preco_maximo", default, deserialize_with = "de_opt_decimal")]
    pub max_price: Option<f64>,
    #[serde(rename = "preco_medio", default, deserialize_with = "de_opt_decimal")]
    pub avg_price: Option<f64>,
    #[serde(rename = "categorias", default)]
    pub categories: Vec<String>,
    #[serde(rename = "marcas", default)]
    pub brands: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductStats {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(rename = "em_estoque", default)]
    pub in_stock: Option<u64>,
    #[serde(rename = "em_promocao", default)]
    pub on_promotion: Option<u64>,
    #[serde(rename = "por_categoria", default)]
    pub by_category: HashMap<String, u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub services: Option<HashMap<String, Value>>,
    #[serde(rename = "produtos_catalogados", default)]
    pub catalogued_products: Option<u64>,
}

/// Acknowledgement for image uploads; the backend's shape is not fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageUpload(pub Value);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_accepts_string_decimals() {
        let product: Product = serde_json::from_value(json!({
            "id": 7,
            "nome": "Sandália Conforto",
            "categoria": "Calçados",
            "preco": "129.90",
            "preco_promocional": "99.90",
            "estoque": 4,
            "avaliacao": "4.50"
        }))
        .unwrap();

        assert_eq!(product.price, 129.90);
        assert_eq!(product.promo_price, Some(99.90));
        assert_eq!(product.rating, Some(4.5));
        assert_eq!(product.brand, None);
    }

    #[test]
    fn test_minimal_product_shape() {
        let product: Product = serde_json::from_value(json!({
            "id": 1,
            "nome": "Tênis",
            "categoria": "Calçados",
            "preco": 199.0,
            "preco_promocional": null,
            "score": 0.87
        }))
        .unwrap();

        assert_eq!(product.stock, 0);
        assert_eq!(product.promo_price, None);
        assert_eq!(product.score, Some(0.87));
    }

    #[test]
    fn test_rejects_garbage_decimal() {
        let result: Result<Product, _> = serde_json::from_value(json!({
            "nome": "X", "categoria": "Y", "preco": "abc"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_filters_produce_no_pairs() {
        assert!(ProductFilters::default().to_query_pairs().is_empty());

        let blank = ProductFilters {
            category: Some("   ".to_string()),
            search: Some(String::new()),
            ..Default::default()
        };
        assert!(blank.to_query_pairs().is_empty());
    }

    #[test]
    fn test_filters_to_query_pairs() {
        let filters = ProductFilters {
            category: Some("Calçados".to_string()),
            min_price: Some(50.0),
            max_price: Some(100.5),
            in_stock: Some(true),
            ordering: Some(SortKey::PriceDesc),
            page: Some(2),
            ..Default::default()
        };

        let pairs = filters.to_query_pairs();
        assert!(pairs.contains(&("categoria", "Calçados".to_string())));
        assert!(pairs.contains(&("preco_min", "50".to_string())));
        assert!(pairs.contains(&("preco_max", "100.5".to_string())));
        assert!(pairs.contains(&("em_estoque", "true".to_string())));
        assert!(pairs.contains(&("ordering", "-preco".to_string())));
        assert!(pairs.contains(&("page", "2".to_string())));
        assert_eq!(pairs.len(), 6);
    }

    #[test]
    fn test_rag_response_decodes() {
        let response: RagResponse = serde_json::from_value(json!({
            "query": "sandália",
            "resposta": "Encontrei 1 produto.",
            "produtos_encontrados": 1,
            "produtos": [{"id": 3, "nome": "Sandália", "categoria": "Calçados", "preco": 89.9, "estoque": 12}],
            "tempo_processamento": 1.234
        }))
        .unwrap();

        assert_eq!(response.match_count, 1);
        assert_eq!(response.products[0].id, 3);
        assert_eq!(response.processing_time, 1.234);
    }
}
