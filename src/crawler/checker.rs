//! HTTP liveness checker
//!
//! Probes a batch of URLs with bounded parallelism and per-URL retry. A
//! failure for an individual URL is always encoded in that URL's result
//! record; the batch itself only errs on malformed input.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Instant;
use thiserror::Error;
use url::Url;

/// Errors for the batch as a whole (never for an individual URL)
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("Check batch is empty")]
    EmptyBatch,
}

/// One URL to check, with source attribution for the broken-link report
#[derive(Debug, Clone)]
pub struct CheckTarget {
    pub url: String,
    pub source_url: String,
    pub link_text: Option<String>,
}

/// Classified failure kind for a non-working link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckErrorKind {
    /// Request exceeded the configured timeout
    Timeout,

    /// Hostname could not be resolved
    Dns,

    /// Connection refused or dropped
    Connection,

    /// Response arrived with a non-success status
    HttpStatus(u16),

    /// Redirect chain exceeded the client's limit
    TooManyRedirects,

    /// URL could not be parsed; no network attempt was made
    InvalidUrl,

    /// Anything else
    Other,
}

impl CheckErrorKind {
    /// String form stored on broken-link rows
    ///
    /// HTTP failures carry the numeric code so the report can distinguish a
    /// 404 from a 500 without a separate column join.
    pub fn as_db_string(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::Dns => "dns_error".to_string(),
            Self::Connection => "connection_error".to_string(),
            Self::HttpStatus(code) => format!("http_{}", code),
            Self::TooManyRedirects => "redirect_error".to_string(),
            Self::InvalidUrl => "invalid_url".to_string(),
            Self::Other => "other".to_string(),
        }
    }

    /// Transient failures are worth a retry; everything else is final
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Dns | Self::Connection)
    }
}

/// Liveness verdict for one URL
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub url: String,
    pub is_working: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub error: Option<CheckErrorKind>,
    pub error_message: Option<String>,
    pub checked_at: String,
}

/// Checks a batch of URLs, returning results in input order
///
/// Up to `max_concurrent` requests run at once; the per-request timeout is
/// the one configured on `client`. Transient failures (timeout, connection,
/// DNS) are retried up to `retry_attempts` times before the failure verdict
/// is finalized. Malformed URLs are classified without a network attempt.
pub async fn check_batch(
    client: &Client,
    targets: &[CheckTarget],
    max_concurrent: usize,
    retry_attempts: u32,
) -> Result<Vec<CheckOutcome>, CheckerError> {
    if targets.is_empty() {
        return Err(CheckerError::EmptyBatch);
    }

    // buffered (not buffer_unordered): results must line up with input
    // indices so the caller can correlate source attribution
    let checks: Vec<_> = targets
        .iter()
        .map(|target| {
            let client = client.clone();
            let url = target.url.clone();
            async move { check_single(&client, url, retry_attempts).await }
        })
        .collect();

    let outcomes = stream::iter(checks)
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    Ok(outcomes)
}

/// Checks one URL with retry on transient failures
async fn check_single(client: &Client, url: String, retry_attempts: u32) -> CheckOutcome {
    let started = Instant::now();

    if Url::parse(&url).is_err() {
        return CheckOutcome {
            url,
            is_working: false,
            status_code: None,
            response_time_ms: 0,
            error: Some(CheckErrorKind::InvalidUrl),
            error_message: Some("URL could not be parsed".to_string()),
            checked_at: Utc::now().to_rfc3339(),
        };
    }

    let mut attempt = 0;
    loop {
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let elapsed = started.elapsed().as_millis() as u64;
                return finalize(url, status, elapsed);
            }
            Err(e) => {
                let kind = classify_request_error(&e);
                if kind.is_transient() && attempt < retry_attempts {
                    attempt += 1;
                    tracing::debug!(
                        "Transient failure for {} ({}), retry {}/{}",
                        url,
                        kind.as_db_string(),
                        attempt,
                        retry_attempts
                    );
                    continue;
                }

                return CheckOutcome {
                    url,
                    is_working: false,
                    status_code: None,
                    response_time_ms: started.elapsed().as_millis() as u64,
                    error: Some(kind),
                    error_message: Some(e.to_string()),
                    checked_at: Utc::now().to_rfc3339(),
                };
            }
        }
    }
}

/// Builds the verdict for a response that carried a status code
fn finalize(url: String, status: u16, response_time_ms: u64) -> CheckOutcome {
    // Redirects are followed by the client, so a 3xx here means the chain
    // ended within policy; both 2xx and 3xx count as working
    let is_working = (200..400).contains(&status);

    CheckOutcome {
        url,
        is_working,
        status_code: Some(status),
        response_time_ms,
        error: (!is_working).then_some(CheckErrorKind::HttpStatus(status)),
        error_message: (!is_working).then(|| format!("HTTP {}", status)),
        checked_at: Utc::now().to_rfc3339(),
    }
}

/// Classifies a reqwest error into a failure kind
fn classify_request_error(error: &reqwest::Error) -> CheckErrorKind {
    if error.is_timeout() {
        return CheckErrorKind::Timeout;
    }
    if error.is_redirect() {
        return CheckErrorKind::TooManyRedirects;
    }
    if error.is_connect() {
        // Connection errors cover DNS failures; sniff the message
        if error.to_string().to_lowercase().contains("dns") {
            return CheckErrorKind::Dns;
        }
        return CheckErrorKind::Connection;
    }
    CheckErrorKind::Other
}
