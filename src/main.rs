//! Linkprobe main entry point
//!
//! This is the command-line interface for the linkprobe broken-link auditor.

use anyhow::Context;
use clap::Parser;
use linkprobe::config::{load_config, Config};
use linkprobe::job::{poll_status, JobRunner, PreAnalyzedUrl, RunnerConfig, StartRequest};
use linkprobe::storage::{open_store, JobStore, ResultsPage, ResultsView};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Linkprobe: a broken-link auditor for websites
///
/// Linkprobe crawls a website to discover its links, checks each link's
/// liveness over HTTP, and records every broken link with the page it was
/// found on. Jobs are persisted in SQLite and can be inspected or stopped
/// while they run.
#[derive(Parser, Debug)]
#[command(name = "linkprobe")]
#[command(version)]
#[command(about = "A broken-link auditor for websites", long_about = None)]
struct Cli {
    /// Website URL to audit
    #[arg(value_name = "URL", required_unless_present_any = ["status", "results", "stop"])]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the configured path)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Maximum crawl depth from the start URL
    #[arg(long, value_name = "DEPTH")]
    max_depth: Option<u32>,

    /// Also check links pointing at other hosts
    #[arg(long)]
    include_external: bool,

    /// JSON file with pre-analyzed URLs; skips the discovery phase
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show the status of a job and exit
    #[arg(long, value_name = "JOB_ID", conflicts_with_all = ["results", "stop"])]
    status: Option<i64>,

    /// Print the broken-link report for a job and exit
    #[arg(long, value_name = "JOB_ID", conflicts_with_all = ["status", "stop"])]
    results: Option<i64>,

    /// Which result view to print with --results
    #[arg(long, value_enum, default_value = "broken", requires = "results")]
    view: ViewArg,

    /// Request a running job to stop at its next batch boundary and exit
    #[arg(long, value_name = "JOB_ID", conflicts_with_all = ["status", "results"])]
    stop: Option<i64>,
}

/// CLI face of the result views
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ViewArg {
    All,
    Working,
    Broken,
    Pages,
}

impl From<ViewArg> for ResultsView {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::All => ResultsView::All,
            ViewArg::Working => ResultsView::Working,
            ViewArg::Broken => ResultsView::Broken,
            ViewArg::Pages => ResultsView::Pages,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path).context("failed to load configuration")?
        }
        None => Config::default(),
    };

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.database_path));

    if let Some(job_id) = cli.status {
        handle_status(&db_path, job_id)?;
    } else if let Some(job_id) = cli.results {
        handle_results(&db_path, job_id, cli.view.into())?;
    } else if let Some(job_id) = cli.stop {
        handle_stop(&db_path, job_id)?;
    } else {
        // clap guarantees the URL is present in this branch
        let url = cli.url.clone().expect("URL argument");
        handle_check(&db_path, config, cli, url).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkprobe=info,warn"),
            1 => EnvFilter::new("linkprobe=debug,info"),
            2 => EnvFilter::new("linkprobe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the main check operation: start a job and run it to completion
async fn handle_check(
    db_path: &PathBuf,
    config: Config,
    cli: Cli,
    url: String,
) -> anyhow::Result<()> {
    let mut settings = config.job_settings();
    if let Some(depth) = cli.max_depth {
        settings.max_depth = depth;
    }
    if cli.include_external {
        settings.include_external = true;
    }

    let pre_analyzed_urls = match &cli.urls_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let urls: Vec<PreAnalyzedUrl> =
                serde_json::from_str(&content).context("failed to parse URLs file")?;
            tracing::info!("Loaded {} pre-analyzed URLs, skipping discovery", urls.len());
            Some(urls)
        }
        None => None,
    };

    let store = Arc::new(Mutex::new(open_store(db_path)?));
    let runner = JobRunner::new(store.clone(), RunnerConfig::from_config(&config));

    let response = runner.start_job(StartRequest {
        url,
        settings,
        pre_analyzed_urls,
    })?;
    println!("Started job {}", response.job_id);

    match runner.run(response.job_id).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!("Job {} failed: {}", response.job_id, e);
            return Err(e.into());
        }
    }

    let snapshot = poll_status(&*store.lock().unwrap(), response.job_id)?;
    println!(
        "\nJob {} {:?}: {} links checked, {} broken",
        response.job_id,
        snapshot.status,
        snapshot.stats.total_links_discovered,
        snapshot.stats.broken_links_found
    );

    if snapshot.stats.broken_links_found > 0 {
        print_broken_links(&*store.lock().unwrap(), response.job_id)?;
    }

    Ok(())
}

/// Handles the --status mode: print a job snapshot as JSON
fn handle_status(db_path: &PathBuf, job_id: i64) -> anyhow::Result<()> {
    let store = open_store(db_path)?;
    let snapshot = poll_status(&store, job_id)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Handles the --results mode: print one result view for a job
fn handle_results(db_path: &PathBuf, job_id: i64, view: ResultsView) -> anyhow::Result<()> {
    const PAGE_SIZE: usize = 100;

    let store = open_store(db_path)?;
    // Job lookup first, so a bad ID errors instead of printing a clean report
    let snapshot = poll_status(&store, job_id)?;

    println!(
        "Job {} ({:?}): {} links discovered, {} broken",
        job_id,
        snapshot.status,
        snapshot.stats.total_links_discovered,
        snapshot.stats.broken_links_found
    );

    let mut offset = 0;
    loop {
        let page = store.results_page(job_id, view, PAGE_SIZE, offset)?;
        let len = match &page {
            ResultsPage::Links(links) => {
                for link in links {
                    let verdict = match link.is_working {
                        Some(true) => "ok",
                        Some(false) => "broken",
                        None => "unchecked",
                    };
                    println!("  [{}] {} (depth {})", verdict, link.url, link.depth);
                }
                links.len()
            }
            ResultsPage::Broken(rows) => {
                for link in rows {
                    let status = link
                        .status_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  [{}] {} (found on {}, {})",
                        status, link.url, link.source_url, link.error_type
                    );
                }
                rows.len()
            }
            ResultsPage::Pages(pages) => {
                for page_url in pages {
                    println!("  {}", page_url);
                }
                pages.len()
            }
        };

        if len < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }

    Ok(())
}

/// Handles the --stop mode: request a cooperative stop
fn handle_stop(db_path: &PathBuf, job_id: i64) -> anyhow::Result<()> {
    let store = Arc::new(Mutex::new(open_store(db_path)?));
    let runner = JobRunner::new(store, RunnerConfig::from_config(&Config::default()));
    runner.stop_job(job_id)?;
    println!("Stop requested for job {}", job_id);
    Ok(())
}

/// Prints the broken-link report, page by page
fn print_broken_links<S: JobStore>(store: &S, job_id: i64) -> anyhow::Result<()> {
    const PAGE_SIZE: usize = 100;

    let mut offset = 0;
    loop {
        let page = store.broken_links_page(job_id, PAGE_SIZE, offset)?;
        if page.is_empty() {
            break;
        }

        for link in &page {
            let status = link
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  [{}] {} (found on {}, {})",
                status, link.url, link.source_url, link.error_type
            );
        }

        offset += PAGE_SIZE;
    }

    Ok(())
}
