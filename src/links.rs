//! Invoice link extraction from a saved billing-history page.

use std::collections::HashSet;

use scraper::{Html, Selector};

/// Prefix of Stripe-hosted invoice pages.
pub const STRIPE_INVOICE_PREFIX: &str = "https://invoice.stripe.com/i/";

/// Collect hosted-invoice links from `html`, first occurrence first, without duplicates.
pub fn extract_invoice_links(html: &str) -> Vec<String> {
    extract_links_with_prefix(html, STRIPE_INVOICE_PREFIX)
}

/// Collect every `<a href>` starting with `prefix`, deduplicated in document order.
///
/// Relative or malformed hrefs never match an absolute prefix, so they are
/// dropped without further checks.
pub fn extract_links_with_prefix(html: &str, prefix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with(prefix))
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}
