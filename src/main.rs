//! # news_harvest
//!
//! A same-day news acquisition pipeline: a fixed set of external sources,
//! each reachable as a syndication feed or an HTML listing page, is scraped
//! concurrently; per-article text is extracted through a best-effort
//! selector cascade, filtered by keyword, classified for sentiment through
//! an external text-classification service, and deduplicated into a SQLite
//! archive.
//!
//! ## Usage
//!
//! ```sh
//! GOOGLE_API_KEY=... news_harvest --keyword modi
//! ```
//!
//! ## Architecture
//!
//! 1. **Fan-out**: one worker task per configured source, launched with a
//!    small stagger
//! 2. **Extraction**: feed or listing discovery, heuristic date
//!    normalization, content-selector cascade
//! 3. **Filter & classify**: keyword gate, sentiment call per match
//! 4. **Fan-in**: all workers feed one event stream; the consumer drains it
//!    until every worker has finished, then saves to the archive

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod dates;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod sources;
mod store;

use classify::SentimentClient;
use cli::Cli;
use fetch::Fetcher;
use models::{ExtractedArticle, Severity, WorkerEvent};
use pipeline::RunContext;
use store::Archive;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    let args = Cli::parse();

    // --- Source configuration (loaded once, immutable for the run) ---
    let sources = match &args.sources {
        Some(path) => config::load_sources(path)?,
        None => config::default_sources(),
    };
    let total_sources = sources.len();
    info!(count = total_sources, "Loaded source configuration");

    // The classifier is an explicit capability: present when a key was
    // configured, absent otherwise, decided exactly once.
    let classifier = match args.google_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(SentimentClient::new(key.to_string())),
        None => {
            warn!("GOOGLE_API_KEY not set; sentiment analysis disabled");
            None
        }
    };

    let today = Local::now().date_naive();
    let ctx = Arc::new(RunContext {
        fetcher: Fetcher::new(),
        classifier,
        keyword: args.keyword.to_lowercase(),
        today,
    });
    info!(%today, keyword = %args.keyword, "Starting news fetch");

    // --- Concurrent fetch phase ---
    let mut events = pipeline::run(Arc::clone(&ctx), sources);

    let mut collected: Vec<ExtractedArticle> = Vec::new();
    let mut error_events = 0usize;
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Article(article) => {
                info!(
                    source = %article.source,
                    sentiment = %article.sentiment,
                    url = %article.url,
                    title = %article.title,
                    "Matched article"
                );
                collected.push(*article);
            }
            WorkerEvent::Log(log) => match log.severity {
                Severity::Error => {
                    error_events += 1;
                    error!(source = %log.source, "{}", log.message);
                }
                Severity::Success | Severity::Info => {
                    info!(source = %log.source, "{}", log.message);
                }
            },
        }
    }

    info!(
        sources = total_sources,
        matched = collected.len(),
        errors = error_events,
        "Fetch complete"
    );

    // --- Persistence tail: sequential, single writer ---
    if args.dry_run {
        info!("Dry run; skipping archive save");
    } else if collected.is_empty() {
        info!("No matched articles to save");
    } else {
        let archive = Archive::open(&args.db_path)?;
        let summary = archive.save_all(&collected);
        if summary.errors > 0 {
            error!(
                inserted = summary.inserted,
                ignored = summary.ignored,
                errors = summary.errors,
                "Archive save finished with errors"
            );
        } else {
            info!(
                inserted = summary.inserted,
                ignored = summary.ignored,
                "Archive save finished"
            );
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");

    Ok(())
}
