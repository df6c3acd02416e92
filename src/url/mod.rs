//! URL normalization and classification
//!
//! Discovered links are deduplicated per job by their normalized form, so
//! normalization has to be stable: the same page reached through different
//! spellings must map to one row.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Extracts the host from a URL, lowercased and with any `www.` prefix removed
///
/// Returns None for URLs without a host (e.g. `mailto:`).
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Classifies a URL as internal or external relative to the crawl origin host
///
/// Internal means host equality after `www.` stripping; subdomains are
/// treated as external.
pub fn is_internal(url: &Url, origin_host: &str) -> bool {
    match extract_host(url) {
        Some(host) => host == origin_host,
        None => false,
    }
}
