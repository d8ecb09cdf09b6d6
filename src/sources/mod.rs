//! Per-source workers for the two fetch strategies.
//!
//! Each configured source runs end-to-end in its own worker: discover
//! entries (from a feed or a listing page), resolve dates, filter, classify,
//! and emit events. Workers share nothing but the event channel — the
//! per-run "seen URLs" set lives on the worker's own stack, so there is no
//! cross-source contention and a URL is processed at most once per run.
//!
//! All fallible steps are contained here and converted into [`LogEvent`]s;
//! a worker never propagates an error to the aggregator or its siblings.

pub mod feed;
pub mod listing;

use crate::config::Source;
use crate::models::{LogEvent, WorkerEvent};
use crate::pipeline::RunContext;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument};
use url::Url;

/// Run one source to completion, emitting progress and article events.
#[instrument(level = "info", skip_all, fields(source = %source.name()))]
pub async fn scrape_source(
    ctx: Arc<RunContext>,
    source: Source,
    events: UnboundedSender<WorkerEvent>,
) {
    let name = source.name().to_string();
    let _ = events.send(WorkerEvent::Log(LogEvent::info(&name, "starting")));

    let mut seen: HashSet<String> = HashSet::new();
    let matched = match &source {
        Source::Feed(feed_source) => feed::scrape(&ctx, feed_source, &events, &mut seen).await,
        Source::Listing(listing_source) => {
            listing::scrape(&ctx, listing_source, &events, &mut seen).await
        }
    };

    let message = format!("finished ({matched} matched filter)");
    let event = if matched > 0 {
        LogEvent::success(&name, message)
    } else {
        LogEvent::info(&name, message)
    };
    let _ = events.send(WorkerEvent::Log(event));
    info!(matched, "Finished scraping source");
}

/// Resolve a discovered link to an absolute http(s) URL.
///
/// Relative links resolve against the source's base (the feed's declared
/// link or the listing page URL). Anything that doesn't come out
/// `http`-prefixed is rejected and the candidate is skipped.
pub(crate) fn resolve_link(base: Option<&str>, link: &str) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let resolved = match base.and_then(|b| Url::parse(b.trim()).ok()) {
        Some(base_url) => base_url.join(link).ok()?,
        None => Url::parse(link).ok()?,
    };
    if resolved.scheme().starts_with("http") {
        Some(resolved)
    } else {
        debug!(link, "Skipping non-http link");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_base() {
        let url = resolve_link(Some("https://example.com/section/"), "/india/story-1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/india/story-1");
    }

    #[test]
    fn test_resolve_absolute_ignores_base() {
        let url = resolve_link(
            Some("https://example.com/"),
            "https://other.example.org/story",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://other.example.org/story");
    }

    #[test]
    fn test_resolve_without_base() {
        assert!(resolve_link(None, "https://example.com/story").is_some());
        assert!(resolve_link(None, "/relative/only").is_none());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert!(resolve_link(None, "javascript:void(0)").is_none());
        assert!(resolve_link(None, "mailto:desk@example.com").is_none());
        assert!(resolve_link(Some("https://example.com/"), "").is_none());
    }
}
