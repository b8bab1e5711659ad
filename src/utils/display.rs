use crate::conversation::{Message, Role};
use crate::core::models::{HealthStatus, Product, ProductStats, RagStats};
use crate::core::pricing::{discount_percentage, format_currency, has_promotion, image_url, is_low_stock};
use colored::*;
use std::io::{self, Write};

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
    let _ = io::stdout().flush();
}

/// One-line summary plus price/stock badges.
pub fn product_line(product: &Product) -> String {
    let mut line = format!("#{} {} ({})", product.id, product.name.bold(), product.category);

    if let Some(brand) = &product.brand {
        line.push_str(&format!(" - {}", brand));
    }

    if has_promotion(product) {
        let promo = product.promo_price.unwrap_or(product.price);
        line.push_str(&format!(
            "  {} {} {}",
            format_currency(product.price).dimmed().strikethrough(),
            format_currency(promo).green().bold(),
            format!("-{}%", discount_percentage(product.price, product.promo_price)).red()
        ));
    } else {
        line.push_str(&format!("  {}", format_currency(product.price).bold()));
    }

    if product.stock == 0 {
        line.push_str(&format!("  {}", "out of stock".red()));
    } else if is_low_stock(product.stock) {
        line.push_str(&format!("  {}", format!("only {} left", product.stock).yellow()));
    }

    if let Some(rating) = product.rating {
        line.push_str(&format!("  ★ {:.1}", rating));
    }

    line
}

pub fn print_product(product: &Product, media_base: &str) {
    println!("  {}", product_line(product));
    if let Some(url) = image_url(product, media_base) {
        println!("    {}", url.dimmed());
    }
}

pub fn print_product_details(product: &Product, media_base: &str) {
    print_product(product, media_base);
    let fields = [
        ("Subcategory", product.subcategory.as_deref()),
        ("Color", product.color.as_deref()),
        ("Size", product.size.as_deref()),
        ("Material", product.material.as_deref()),
        ("Dimensions", product.dimensions.as_deref()),
        ("Description", product.description.as_deref()),
        ("Specifications", product.specifications.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("    {}: {}", label.bold(), value);
        }
    }
    println!("    {}: {}", "Stock".bold(), product.stock);
}

pub fn print_message(message: &Message, media_base: &str) {
    let time = message.timestamp.format("%H:%M");
    match message.role {
        Role::User => println!("{} {} {}", time.to_string().dimmed(), "You:".yellow().bold(), message.content),
        Role::System => println!("{} {}", time.to_string().dimmed(), message.content.bright_black()),
        Role::Assistant if message.error => {
            println!("{} {} {}", time.to_string().dimmed(), "Assistant:".red().bold(), message.content.red())
        }
        Role::Assistant => {
            println!("{} {} {}", time.to_string().dimmed(), "Assistant:".cyan().bold(), message.content);
        }
    }

    for product in message.products() {
        print_product(product, media_base);
    }

    if let Some(seconds) = message.processing_time {
        println!("  {}", format!("({:.2}s)", seconds).dimmed());
    }
}

pub fn print_rag_stats(stats: &RagStats) {
    print_header("Catalogue");
    if let Some(total) = stats.total_products {
        println!("  Products: {}", total);
    }
    if let Some(embedded) = stats.embedded_products {
        println!("  With embeddings: {}", embedded);
    }
    if let (Some(min), Some(max)) = (stats.min_price, stats.max_price) {
        println!("  Price range: {} - {}", format_currency(min), format_currency(max));
    }
    if let Some(avg) = stats.avg_price {
        println!("  Average price: {}", format_currency(avg));
    }
    if !stats.categories.is_empty() {
        println!("  Categories: {}", stats.categories.join(", "));
    }
    if !stats.brands.is_empty() {
        println!("  Brands: {}", stats.brands.join(", "));
    }
    for (key, value) in &stats.extra {
        println!("  {}: {}", key, value);
    }
}

pub fn print_product_stats(stats: &ProductStats) {
    print_header("Products");
    if let Some(total) = stats.total {
        println!("  Total: {}", total);
    }
    if let Some(in_stock) = stats.in_stock {
        println!("  In stock: {}", in_stock);
    }
    if let Some(promo) = stats.on_promotion {
        println!("  On promotion: {}", promo);
    }
    let mut categories: Vec<_> = stats.by_category.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (category, count) in categories {
        println!("  {}: {}", category, count);
    }
    for (key, value) in &stats.extra {
        println!("  {}: {}", key, value);
    }
}

pub fn print_health(health: &HealthStatus) {
    let status = if health.status.eq_ignore_ascii_case("ok") || health.status.eq_ignore_ascii_case("healthy") {
        health.status.green().bold()
    } else {
        health.status.red().bold()
    };
    println!("Status: {}", status);
    if let Some(message) = &health.message {
        println!("  {}", message);
    }
    if let Some(version) = &health.version {
        println!("  Version: {}", version);
    }
    if let Some(count) = health.catalogued_products {
        println!("  Catalogued products: {}", count);
    }
    if let Some(services) = &health.services {
        for (name, state) in services {
            println!("  {}: {}", name, state);
        }
    }
}
