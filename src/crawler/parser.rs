//! HTML queries used by the HTTP page driver
//!
//! This module handles parsing page markup to:
//! - Extract links matched by the configured link selector
//! - Take the inner HTML of the target element
//! - Check that configured CSS selectors are valid

use scraper::{Html, Selector};
use url::Url;

/// Parses a CSS selector
///
/// # Returns
///
/// * `Ok(Selector)` - The compiled selector
/// * `Err(String)` - The selector is not valid CSS
pub fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("'{}' is not a valid CSS selector: {}", selector, e))
}

/// Extracts the links matched by `selector` from the document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `href` of every matched element, resolved against `base_url`
///
/// **Exclude:**
/// - Matched elements without an `href`
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Duplicates are kept; the request queue deduplicates.
///
/// # Arguments
///
/// * `html` - The page markup
/// * `base_url` - The URL the page was loaded from
/// * `selector` - The link selector, e.g. `a[href]`
///
/// # Example
///
/// ```
/// use gleaner::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<html><body><nav><a href="/docs">Docs</a></nav><a href="/blog">Blog</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base_url, "nav a[href]").unwrap();
/// assert_eq!(links, vec!["https://example.com/docs".to_string()]);
/// ```
pub fn extract_links(html: &str, base_url: &Url, selector: &str) -> Result<Vec<String>, String> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    let links = document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect();

    Ok(links)
}

/// Returns the inner HTML of the first element matching `selector`
pub fn inner_html(html: &str, selector: &str) -> Result<Option<String>, String> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document.select(&selector).next().map(|element| element.inner_html()))
}

/// Returns true if the content type is an HTML document
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
