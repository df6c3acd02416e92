//! Page-fetch primitive
//!
//! This module handles HTTP requests for the discovery traversal:
//! - Building the shared HTTP client
//! - GET requests for page content
//! - Content-Type gating (only HTML pages are parsed for links)
//! - Error classification

use reqwest::Client;
use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("linkprobe/", env!("CARGO_PKG_VERSION"));

/// Result of fetching one page during discovery
#[derive(Debug)]
pub enum PageFetch {
    /// Page responded successfully with an HTML-like content type
    Html {
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Page responded successfully but is not HTML; no links to extract
    NonHtml {
        /// The Content-Type received
        content_type: String,
    },

    /// Page responded with a non-success status
    HttpError { status_code: u16 },

    /// Request failed at the network level
    NetworkError { error: String },
}

/// Builds the HTTP client shared by discovery and checking
///
/// Redirects follow reqwest's default policy (up to 10 hops). The timeout
/// applies per request.
pub fn build_http_client(timeout_ms: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page and classifies the outcome
///
/// Only `Html` results feed the link extractor; everything else is recorded
/// and the traversal moves on.
pub async fn fetch_page(client: &Client, url: &str) -> PageFetch {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            return PageFetch::NetworkError {
                error: e.to_string(),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return PageFetch::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html_content_type(&content_type) {
        return PageFetch::NonHtml { content_type };
    }

    match response.text().await {
        Ok(body) => PageFetch::Html {
            status_code: status.as_u16(),
            body,
        },
        Err(e) => PageFetch::NetworkError {
            error: e.to_string(),
        },
    }
}

/// Returns true for content types that can be parsed for links
///
/// An absent Content-Type header counts as HTML: plenty of small sites omit
/// it on pages that are navigable markup.
fn is_html_content_type(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}
