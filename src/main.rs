use anyhow::{Context, Result};
use clap::Parser;
use ragchat::cli::{Cli, Commands};
use ragchat::config::Settings;
use ragchat::conversation::{ConversationController, ConversationEvent, Interrupt, SendOutcome};
use ragchat::core::models::{Product, ProductFilters};
use ragchat::core::RagClient;
use ragchat::{storage, utils};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::new().context("Failed to load settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Some(url) = cli.api_url {
        settings.api.base_url = url;
    }
    if let Some(backend) = cli.storage {
        settings.storage.backend = backend;
    }

    let client = Arc::new(RagClient::new(&settings.api)?);
    tracing::debug!("Using API at {}", client.base_url());

    match cli.command {
        Commands::Chat => handle_chat(settings, client).await,
        Commands::Ask { query, limit } => handle_ask(&client, &query, limit).await,
        Commands::Search { query, limit } => handle_search(&client, &query, limit).await,
        Commands::Products(args) => handle_products(&client, args.into()).await,
        Commands::Product { id } => {
            let product = client.get_product(id).await?;
            utils::print_product_details(&product, &client.media_base());
            Ok(())
        }
        Commands::DeleteProduct { id } => {
            client.delete_product(id).await?;
            utils::print_success(&format!("Product {} deleted", id));
            Ok(())
        }
        Commands::UploadImage { id, file } => handle_upload(&client, id, &file).await,
        Commands::SetImageUrl { id, url } => {
            client.set_image_url(id, &url).await?;
            utils::print_success(&format!("Image URL set for product {}", id));
            Ok(())
        }
        Commands::Stats => handle_stats(&client).await,
        Commands::Health => {
            let health = client.health_check().await?;
            utils::print_health(&health);
            Ok(())
        }
        Commands::ClearHistory => {
            let store = storage::open(&settings.storage).await?;
            store.delete(&settings.storage.key).await?;
            utils::print_success("Chat history cleared");
            Ok(())
        }
    }
}

async fn handle_chat(settings: Settings, client: Arc<RagClient>) -> Result<()> {
    let media_base = client.media_base();
    let store = storage::open(&settings.storage).await?;
    let mut chat = ConversationController::new(
        client.clone(),
        store,
        settings.storage.key.clone(),
        settings.conversation.clone(),
    )
    .await;

    let mut events = chat.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event == ConversationEvent::PendingChanged(true) {
                utils::print_info("Searching...");
            }
        }
    });

    let canceller = chat.canceller();
    let shutdown = CancellationToken::new();
    let interrupted = shutdown.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if canceller.interrupt(&interrupted) == Interrupt::Shutdown {
                break;
            }
        }
    });

    utils::print_header("Product Assistant");
    utils::print_info("Type your question, /help for commands, Ctrl+C to exit\n");

    if chat.show_welcome() {
        utils::print_info("Try one of these:");
        for suggestion in chat.suggestions() {
            println!("  - {}", suggestion);
        }
        println!();
    } else {
        utils::print_success(&format!("Resumed conversation with {} messages", chat.message_count()));
        for message in chat.messages() {
            utils::print_message(message, &media_base);
        }
        println!();
    }

    let mut last_shown = chat.messages().back().map(|m| m.id).unwrap_or(0);
    let mut reader = BufReader::new(io::stdin());

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        let read = tokio::select! {
            _ = shutdown.cancelled() => 0,
            read = reader.read_line(&mut input) => read?,
        };
        if read == 0 {
            break;
        }

        let input = input.trim();
        if !chat.can_send(input) {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            match name {
                "help" => {
                    print_help();
                    continue;
                }
                "clear" => {
                    chat.clear().await;
                    last_shown = 0;
                    utils::print_success("Conversation cleared\n");
                    continue;
                }
                "count" => {
                    utils::print_info(&format!("Messages in conversation: {}\n", chat.message_count()));
                    continue;
                }
                "details" | "similar" | "cart" => {
                    let Ok(id) = arg.trim().parse::<u64>() else {
                        utils::print_warning(&format!("Usage: /{} <product id>", name));
                        continue;
                    };
                    match name {
                        "details" => {
                            chat.view_details(id).await;
                        }
                        _ => {
                            let Some(product) = find_product(&chat, &client, id).await else {
                                utils::print_warning(&format!("Product {} not found", id));
                                continue;
                            };
                            if name == "similar" {
                                chat.find_similar(&product).await;
                            } else {
                                chat.add_to_cart(&product).await;
                            }
                        }
                    }
                }
                _ => {
                    utils::print_warning("Unknown command, try /help");
                    continue;
                }
            }
        } else if let SendOutcome::Busy = chat.send(input).await {
            utils::print_warning("Still waiting for the previous answer");
        }

        for message in chat.messages().iter().filter(|m| m.id > last_shown) {
            utils::print_message(message, &media_base);
        }
        last_shown = chat.messages().back().map(|m| m.id).unwrap_or(last_shown);
        println!();
    }

    println!();
    utils::print_info("Goodbye!");
    Ok(())
}

/// Prefer the copy already shown in the conversation; fall back to the API.
async fn find_product(
    chat: &ConversationController,
    client: &RagClient,
    id: u64,
) -> Option<Product> {
    let known = chat
        .messages()
        .iter()
        .rev()
        .flat_map(|m| m.products())
        .find(|p| p.id == id)
        .cloned();

    match known {
        Some(product) => Some(product),
        None => client.get_product(id).await.ok(),
    }
}

fn print_help() {
    println!("Special commands:");
    println!("  /details <id>  - Show full product details");
    println!("  /similar <id>  - Look for similar products");
    println!("  /cart <id>     - Add a product to the cart");
    println!("  /clear         - Clear conversation history");
    println!("  /count         - Show message count");
    println!("  /help          - Show this help");
    println!("  Ctrl+C         - Cancel the current search, or exit\n");
}

async fn handle_ask(client: &RagClient, query: &str, limit: Option<u32>) -> Result<()> {
    let response = client.query(query, limit).await?;

    println!("\n{}\n", response.answer);
    let media_base = client.media_base();
    for product in &response.products {
        utils::print_product(product, &media_base);
    }
    utils::print_info(&format!(
        "{} products in {:.2}s",
        response.match_count, response.processing_time
    ));
    Ok(())
}

async fn handle_search(client: &RagClient, query: &str, limit: Option<u32>) -> Result<()> {
    let result = client.search(query, limit).await?;

    utils::print_header(&format!("{} results for \"{}\"", result.total, result.query));
    let media_base = client.media_base();
    for product in &result.products {
        utils::print_product(product, &media_base);
    }
    Ok(())
}

async fn handle_products(client: &RagClient, filters: ProductFilters) -> Result<()> {
    let page = client.list_products(&filters).await?;

    utils::print_header(&format!("{} products", page.count));
    let media_base = client.media_base();
    for product in &page.results {
        utils::print_product(product, &media_base);
    }
    if page.next.is_some() {
        let next = filters.page.unwrap_or(1) + 1;
        utils::print_info(&format!("More results available: --page {}", next));
    }
    Ok(())
}

async fn handle_upload(client: &RagClient, id: u64, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read image file: {:?}", file))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    client.upload_image(id, &file_name, bytes).await?;
    utils::print_success(&format!("Image uploaded for product {}", id));
    Ok(())
}

async fn handle_stats(client: &RagClient) -> Result<()> {
    let (rag, products) = futures::future::join(client.stats(), client.product_stats()).await;

    match rag {
        Ok(stats) => utils::print_rag_stats(&stats),
        Err(e) => utils::print_error(&format!("Catalogue stats unavailable: {}", e)),
    }
    match products {
        Ok(stats) => utils::print_product_stats(&stats),
        Err(e) => utils::print_error(&format!("Product stats unavailable: {}", e)),
    }
    Ok(())
}
