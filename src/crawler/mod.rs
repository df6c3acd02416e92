//! Crawling and checking components
//!
//! Leaves first: the fetcher issues page requests, the extractor pulls
//! candidate links out of fetched markup, the discovery engine runs the
//! breadth-first traversal over both, and the checker probes discovered URLs
//! for liveness.

mod checker;
mod discovery;
mod extractor;
mod fetcher;

pub use checker::{check_batch, CheckErrorKind, CheckOutcome, CheckTarget, CheckerError};
pub use discovery::{run_discovery, DiscoverySummary, Frontier, PendingPage};
pub use extractor::{extract_links, ExtractedLink};
pub use fetcher::{build_http_client, fetch_page, PageFetch};
