//! HTML parser for extracting text, title, and links
//!
//! This module handles parsing HTML content to extract:
//! - Visible text (script and style content excluded)
//! - Page title
//! - Anchors with their link text, resolved to absolute URLs

use crate::crawler::content::collapse_whitespace;
use crate::storage::Link;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag), empty if missing
    pub title: String,

    /// Visible text with whitespace collapsed
    pub text: String,

    /// Links found on the page, fragment-free and deduplicated
    pub links: Vec<Link>,
}

/// Parses HTML content and extracts text, title, and links
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` resolved against `base_url`, fragment removed
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, and data URIs
/// - fragment-only links (same page anchors)
/// - schemes other than http, https, and `forum_scheme`
/// - relative links that only resolve to a forum URL because the page itself
///   is on the forum scheme
///
/// # Example
///
/// ```
/// use exam_crawler::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page#x">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, "piazza");
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url, forum_scheme: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url, forum_scheme),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .unwrap_or_default()
}

/// Collects text nodes that are not inside script, style, or noscript
fn extract_text(document: &Html) -> String {
    let mut raw = String::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });

        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }

    collapse_whitespace(&raw)
}

/// Extracts every followable anchor from the document
fn extract_links(document: &Html, base_url: &Url, forum_scheme: &str) -> Vec<Link> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(url) = resolve_link(href, base_url, forum_scheme) else {
            continue;
        };

        if seen.insert(url.clone()) {
            links.push(Link {
                title: collapse_whitespace(&element.text().collect::<String>()),
                url,
            });
        }
    }

    links
}

/// Resolves a link href to an absolute, fragment-free URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url, forum_scheme: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    absolute_url.set_fragment(None);

    let scheme = absolute_url.scheme();
    if scheme == forum_scheme {
        // Relative hrefs on a forum page would otherwise leak forum paths
        let explicit = lowered
            .strip_prefix(forum_scheme)
            .is_some_and(|rest| rest.starts_with(':'));
        if !explicit {
            return None;
        }
    } else if scheme != "http" && scheme != "https" {
        return None;
    }

    Some(absolute_url.to_string())
}
