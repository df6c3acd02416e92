//! Link extractor
//!
//! Parses fetched page markup and returns normalized, classified candidate
//! links for the discovery engine.

use crate::url::{is_internal, normalize_url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A candidate link pulled out of a page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLink {
    /// Normalized absolute URL
    pub url: String,

    /// Depth of the link target (source page depth + 1)
    pub depth: u32,

    /// Anchor text, if any
    pub link_text: Option<String>,

    /// True if the target host equals the crawl origin host
    pub is_internal: bool,

    /// True if discovery should fetch this target and extract its links too
    pub should_crawl: bool,
}

/// Extracts candidate links from HTML content
///
/// # Rules
///
/// - Relative hrefs are resolved against `base_url`
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only hrefs are
///   skipped
/// - URLs are normalized (fragment dropped, trailing slash canonicalized)
///   and deduplicated within the page
/// - External targets are dropped unless `include_external` is set; when
///   kept, they are checked but never crawled
/// - `should_crawl` is true only for internal targets strictly inside the
///   depth bound
/// - At most `max_links_per_page` links are returned, in document order
pub fn extract_links(
    html: &str,
    base_url: &Url,
    page_depth: u32,
    origin_host: &str,
    max_depth: u32,
    include_external: bool,
    max_links_per_page: usize,
) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);
    let depth = page_depth + 1;

    let mut links = Vec::new();
    let mut seen = HashSet::new();

    // Selector::parse only fails on invalid syntax; "a[href]" is well-formed
    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if links.len() >= max_links_per_page {
            tracing::debug!(
                "Link cap of {} reached on {}, ignoring the rest",
                max_links_per_page,
                base_url
            );
            break;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_href(href, base_url) else {
            continue;
        };

        let normalized = match normalize_url(resolved.as_str()) {
            Ok(u) => u,
            Err(e) => {
                tracing::trace!("Skipping unnormalizable href {}: {}", href, e);
                continue;
            }
        };

        let internal = is_internal(&normalized, origin_host);
        if !internal && !include_external {
            continue;
        }

        let url_str = normalized.to_string();
        if !seen.insert(url_str.clone()) {
            continue;
        }

        let link_text = {
            let text = element.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        };

        links.push(ExtractedLink {
            url: url_str,
            depth,
            link_text,
            is_internal: internal,
            should_crawl: internal && depth < max_depth,
        });
    }

    links
}

/// Resolves a href to an absolute HTTP(S) URL
///
/// Returns None for hrefs that cannot point at a checkable page: special
/// schemes, same-page anchors, empty values, unparseable references.
fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Some(resolved)
    } else {
        None
    }
}
