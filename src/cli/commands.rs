use crate::config::StorageBackend;
use crate::core::models::{ProductFilters, SortKey};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(author, version, about = "Chat with a RAG product-search backend", long_about = None)]
pub struct Cli {
    /// Override the API base URL from settings
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Override where chat history is kept
    #[arg(long, global = true, value_enum)]
    pub storage: Option<StorageBackend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat,

    /// Ask a single question and print the answer
    Ask {
        query: String,

        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Vector search without a generated answer
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// List catalogue products
    Products(ProductArgs),

    /// Show one product
    Product { id: u64 },

    /// Delete a product
    DeleteProduct { id: u64 },

    /// Upload an image file for a product
    UploadImage { id: u64, file: PathBuf },

    /// Point a product at an external image URL
    SetImageUrl { id: u64, url: String },

    /// Catalogue and product statistics
    Stats,

    /// Check backend health
    Health,

    /// Delete the stored chat history
    ClearHistory,
}

#[derive(Args, Debug, Default)]
pub struct ProductArgs {
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub subcategory: Option<String>,

    #[arg(long)]
    pub brand: Option<String>,

    #[arg(long)]
    pub min_price: Option<f64>,

    #[arg(long)]
    pub max_price: Option<f64>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub size: Option<String>,

    /// Only products with stock
    #[arg(long)]
    pub in_stock: bool,

    /// Only products with an active promotion
    #[arg(long)]
    pub on_promotion: bool,

    /// Free-text filter
    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub page_size: Option<u32>,
}

impl From<ProductArgs> for ProductFilters {
    fn from(args: ProductArgs) -> Self {
        ProductFilters {
            category: args.category,
            subcategory: args.subcategory,
            brand: args.brand,
            min_price: args.min_price,
            max_price: args.max_price,
            color: args.color,
            size: args.size,
            in_stock: args.in_stock.then_some(true),
            on_promotion: args.on_promotion.then_some(true),
            search: args.search,
            ordering: args.sort,
            page: args.page,
            page_size: args.page_size,
        }
    }
}
