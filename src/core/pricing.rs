//! Display helpers derived from product fields. No I/O.

use super::models::Product;

pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// Brazilian real formatting: `R$ 1.234,56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, fraction)
}

/// Whole-number discount, 0 when there is no active promotion.
pub fn discount_percentage(base: f64, promo: Option<f64>) -> u32 {
    match promo {
        Some(promo) if base > 0.0 && promo < base => {
            ((base - promo) / base * 100.0).round().max(0.0) as u32
        }
        _ => 0,
    }
}

/// A promotional price only counts when strictly below the base price.
pub fn has_promotion(product: &Product) -> bool {
    matches!(product.promo_price, Some(promo) if promo < product.price)
}

pub fn effective_price(product: &Product) -> f64 {
    if has_promotion(product) {
        product.promo_price.unwrap_or(product.price)
    } else {
        product.price
    }
}

pub fn is_low_stock(stock: u32) -> bool {
    stock > 0 && stock < LOW_STOCK_THRESHOLD
}

/// Uploaded image first, then the external URL. Relative upload paths are
/// joined onto `media_base`.
pub fn image_url(product: &Product, media_base: &str) -> Option<String> {
    if let Some(image) = non_empty(&product.image) {
        if image.starts_with("http://") || image.starts_with("https://") {
            return Some(image.to_string());
        }
        return Some(format!(
            "{}/{}",
            media_base.trim_end_matches('/'),
            image.trim_start_matches('/')
        ));
    }
    non_empty(&product.image_url).map(str::to_string)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
