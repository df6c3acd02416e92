//! Frontier / discovery engine
//!
//! Breadth-first traversal from the start URL, building the full
//! discovered-link set without checking liveness. The frontier is an
//! explicit value scoped to one run, so concurrent jobs never share
//! traversal state.

use crate::config::{DiscoveryConfig, JobSettings};
use crate::crawler::extractor::extract_links;
use crate::crawler::fetcher::{fetch_page, PageFetch};
use crate::storage::{JobStore, NewDiscoveredLink};
use crate::url::{extract_host, normalize_url};
use crate::{LinkProbeError, UrlError};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

/// Traversal progress is logged every this many pages
const LOG_INTERVAL: usize = 10;

/// A page awaiting traversal
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPage {
    pub depth: u32,
    pub source_url: String,
}

/// Traversal state for one discovery run
#[derive(Debug, Default)]
pub struct Frontier {
    visited: HashSet<String>,
    pending: HashMap<String, PendingPage>,
}

impl Frontier {
    /// Creates a frontier seeded with the start URL at depth 0
    pub fn new(start_url: &str) -> Self {
        let mut frontier = Self::default();
        frontier.pending.insert(
            start_url.to_string(),
            PendingPage {
                depth: 0,
                source_url: start_url.to_string(),
            },
        );
        frontier
    }

    /// Removes and returns up to `n` pending pages
    pub fn pop_batch(&mut self, n: usize) -> Vec<(String, PendingPage)> {
        let keys: Vec<String> = self.pending.keys().take(n).cloned().collect();
        keys.into_iter()
            .filter_map(|url| self.pending.remove_entry(&url))
            .collect()
    }

    /// Queues a page for traversal unless it was already seen or queued
    pub fn enqueue(&mut self, url: &str, depth: u32, source_url: &str) {
        if self.visited.contains(url) || self.pending.contains_key(url) {
            return;
        }
        self.pending.insert(
            url.to_string(),
            PendingPage {
                depth,
                source_url: source_url.to_string(),
            },
        );
    }

    /// Marks a page as visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}

/// What one discovery run produced
#[derive(Debug, Clone, Copy)]
pub struct DiscoverySummary {
    pub pages_visited: usize,
    pub links_discovered: u64,
}

/// Runs discovery for a job, populating its discovered-link set
///
/// Pages are traversed in bounded batches; links are flushed to the store in
/// bounded chunks, so an interrupted run leaves consistent partial state. A
/// fetch or parse failure on one page is logged and traversal continues;
/// failing to write the final link set is fatal. The job's progress counters
/// are left to the checking phase, which owns them.
///
/// A global page cap bounds worst-case runtime even when the frontier keeps
/// growing.
pub async fn run_discovery<S: JobStore>(
    client: &Client,
    store: &Mutex<S>,
    job_id: i64,
    start_url: &str,
    settings: &JobSettings,
    discovery: &DiscoveryConfig,
) -> Result<DiscoverySummary, LinkProbeError> {
    let start = normalize_url(start_url)?;
    let origin_host = extract_host(&start).ok_or(UrlError::MissingHost)?;

    let mut frontier = Frontier::new(start.as_str());
    let mut buffer: Vec<NewDiscoveredLink> = Vec::new();
    let mut links_discovered: u64 = 0;
    let mut pages_visited = 0usize;

    tracing::info!("Job {}: discovery starting from {}", job_id, start);

    'traversal: while !frontier.is_exhausted() {
        // Batch boundary: a stop request flips the job terminal externally
        if store.lock().unwrap().get_job(job_id)?.status.is_terminal() {
            tracing::info!("Job {}: stop observed during discovery", job_id);
            break;
        }

        let batch = frontier.pop_batch(discovery.page_batch_size);

        for (page_url, pending) in batch {
            if pages_visited >= discovery.max_pages {
                tracing::warn!(
                    "Job {}: page cap of {} reached with {} pages still pending",
                    job_id,
                    discovery.max_pages,
                    frontier.pending_len() + 1
                );
                break 'traversal;
            }

            if !frontier.mark_visited(&page_url) {
                continue;
            }
            pages_visited += 1;

            let body = match fetch_page(client, &page_url).await {
                PageFetch::Html { body, .. } => body,
                PageFetch::NonHtml { content_type } => {
                    tracing::debug!(
                        "Job {}: skipping non-HTML page {} ({})",
                        job_id,
                        page_url,
                        content_type
                    );
                    continue;
                }
                PageFetch::HttpError { status_code } => {
                    tracing::debug!(
                        "Job {}: page {} returned HTTP {} during discovery",
                        job_id,
                        page_url,
                        status_code
                    );
                    continue;
                }
                PageFetch::NetworkError { error } => {
                    // One unreachable page never aborts the traversal
                    tracing::warn!("Job {}: failed to fetch {}: {}", job_id, page_url, error);
                    continue;
                }
            };

            let base = match Url::parse(&page_url) {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!("Job {}: unparseable page URL {}: {}", job_id, page_url, e);
                    continue;
                }
            };

            let links = extract_links(
                &body,
                &base,
                pending.depth,
                &origin_host,
                settings.max_depth,
                settings.include_external,
                discovery.max_links_per_page,
            );

            for link in links {
                if link.should_crawl {
                    frontier.enqueue(&link.url, link.depth, &page_url);
                }
                buffer.push(NewDiscoveredLink {
                    url: link.url,
                    source_url: page_url.clone(),
                    depth: link.depth,
                    is_internal: link.is_internal,
                    link_text: link.link_text,
                });
            }

            if buffer.len() >= discovery.flush_chunk_size {
                match flush(store, job_id, &mut buffer) {
                    Ok(inserted) => links_discovered += inserted,
                    Err(e) => {
                        // Mid-run flush failures are retried implicitly: the
                        // buffer is kept and written again with the final flush
                        tracing::error!("Job {}: link flush failed: {}", job_id, e);
                    }
                }
            }

            // The job's progress counters belong to the checking phase: a
            // poll must never see current drop when checking resets them, so
            // traversal progress is only logged here
            if pages_visited % LOG_INTERVAL == 0 {
                tracing::info!(
                    "Job {}: discovery visited {} pages, {} pending, {} links found",
                    job_id,
                    pages_visited,
                    frontier.pending_len(),
                    links_discovered + buffer.len() as u64
                );
            }
        }
    }

    // Losing the final chunk would silently shrink the report, so this
    // failure is fatal and surfaces to the scheduler
    links_discovered += flush(store, job_id, &mut buffer)?;

    tracing::info!(
        "Job {}: discovery complete, {} pages visited, {} unique links",
        job_id,
        pages_visited,
        links_discovered
    );

    Ok(DiscoverySummary {
        pages_visited,
        links_discovered,
    })
}

/// Writes buffered links to the store and clears the buffer
fn flush<S: JobStore>(
    store: &Mutex<S>,
    job_id: i64,
    buffer: &mut Vec<NewDiscoveredLink>,
) -> Result<u64, LinkProbeError> {
    if buffer.is_empty() {
        return Ok(0);
    }
    let inserted = store.lock().unwrap().add_discovered_links(job_id, buffer)?;
    buffer.clear();
    Ok(inserted as u64)
}
