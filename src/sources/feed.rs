//! Syndication-feed extraction.
//!
//! Feed documents are parsed as RSS first, then Atom — the same tolerance
//! feedparser-style consumers have, since several configured sources have
//! switched formats over the years. Per entry, the structured publication
//! timestamp is preferred; raw date text goes through the heuristic
//! normalizer. Only entries dated "today" continue into the filter stage.

use crate::classify::process_candidate;
use crate::config::FeedSource;
use crate::dates;
use crate::models::{ArticleCandidate, LogEvent, WorkerEvent};
use crate::pipeline::RunContext;
use crate::sources::resolve_link;
use chrono::NaiveDate;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// One entry pulled out of a parsed feed document, format-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Structured publication date, already parsed by the feed library.
    pub published: Option<NaiveDate>,
    /// Raw date text, for the normalizer when no structured date exists.
    pub raw_date: Option<String>,
}

/// A parsed feed: its declared base link plus its entries, in document order.
#[derive(Debug, Default)]
pub(crate) struct ParsedFeed {
    pub base: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// Scrape one feed source; returns the number of articles that matched the
/// keyword filter.
pub(crate) async fn scrape(
    ctx: &RunContext,
    source: &FeedSource,
    events: &UnboundedSender<WorkerEvent>,
    seen: &mut HashSet<String>,
) -> usize {
    info!(feed_url = %source.feed_url, "Using syndication feed");

    let body = match ctx.fetcher.fetch(&source.feed_url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to fetch feed");
            let _ = events.send(WorkerEvent::Log(LogEvent::error(
                &source.name,
                format!("failed to fetch feed: {e}"),
            )));
            return 0;
        }
    };

    let parsed = match parse_feed(body.as_bytes()) {
        Ok(parsed) => parsed,
        Err(reason) => {
            warn!(%reason, "Feed did not parse as RSS or Atom");
            let _ = events.send(WorkerEvent::Log(LogEvent::info(
                &source.name,
                format!("feed parsing issue: {reason}"),
            )));
            ParsedFeed::default()
        }
    };

    if parsed.entries.is_empty() {
        let _ = events.send(WorkerEvent::Log(LogEvent::info(
            &source.name,
            "no entries found in feed",
        )));
        return 0;
    }
    info!(count = parsed.entries.len(), "Feed entries discovered");

    let mut matched = 0;
    for entry in parsed.entries {
        if entry.title.is_empty() || entry.link.is_empty() {
            debug!("Skipping feed entry with missing title or link");
            continue;
        }
        let Some(link) = resolve_link(parsed.base.as_deref(), &entry.link) else {
            debug!(link = %entry.link, "Skipping feed entry with unresolvable link");
            continue;
        };
        if !seen.insert(link.as_str().to_string()) {
            continue;
        }

        let date = entry.published.or_else(|| {
            entry.raw_date.as_deref().and_then(|text| {
                dates::normalize(text, &format!("{} (feed)", source.name), ctx.today)
            })
        });
        if date != Some(ctx.today) {
            continue;
        }

        let candidate = ArticleCandidate {
            source: source.name.clone(),
            title: entry.title,
            link,
            date: ctx.today,
        };
        if let Some(article) = process_candidate(
            ctx,
            &source.content_selectors,
            source.content_fetch,
            candidate,
            None,
        )
        .await
        {
            let _ = events.send(WorkerEvent::Article(Box::new(article)));
            matched += 1;
        }
    }
    matched
}

/// Parse feed bytes as RSS, then as Atom.
pub(crate) fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, String> {
    if let Ok(channel) = rss::Channel::read_from(bytes) {
        return Ok(parse_rss_channel(&channel));
    }
    match atom_syndication::Feed::read_from(bytes) {
        Ok(feed) => Ok(parse_atom_feed(&feed)),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_rss_channel(channel: &rss::Channel) -> ParsedFeed {
    let base = Some(channel.link().to_string()).filter(|l| !l.is_empty());
    let entries = channel
        .items()
        .iter()
        .map(|item| {
            let raw_date = item.pub_date().map(str::to_string);
            let published = item
                .pub_date()
                .and_then(|d| chrono::DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.date_naive());
            FeedEntry {
                title: item.title().unwrap_or_default().trim().to_string(),
                link: item.link().unwrap_or_default().trim().to_string(),
                published,
                raw_date,
            }
        })
        .collect();
    ParsedFeed { base, entries }
}

fn parse_atom_feed(feed: &atom_syndication::Feed) -> ParsedFeed {
    let base = feed
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| feed.links().first())
        .map(|l| l.href().to_string());
    let entries = feed
        .entries()
        .iter()
        .map(|entry| {
            let published = entry.published().or_else(|| Some(entry.updated()));
            FeedEntry {
                title: entry.title().trim().to_string(),
                link: entry
                    .links()
                    .first()
                    .map(|l| l.href().trim().to_string())
                    .unwrap_or_default(),
                published: published.map(|d| d.date_naive()),
                raw_date: None,
            }
        })
        .collect();
    ParsedFeed { base, entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example India</title>
    <link>https://example.com</link>
    <description>Example</description>
    <item>
      <title>First story</title>
      <link>/india/first-story</link>
      <pubDate>Sat, 12 Apr 2025 09:30:00 +0530</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/india/second-story</link>
      <pubDate>totally not a date</pubDate>
    </item>
    <item>
      <title></title>
      <link>https://example.com/untitled</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <id>urn:example</id>
  <updated>2025-04-12T06:00:00Z</updated>
  <link rel="alternate" href="https://example.org"/>
  <entry>
    <title>Atom story</title>
    <id>urn:example:1</id>
    <updated>2025-04-12T05:00:00Z</updated>
    <link href="https://example.org/atom-story"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_channel() {
        let parsed = parse_feed(RSS_DOC.as_bytes()).unwrap();
        assert_eq!(parsed.base.as_deref(), Some("https://example.com"));
        assert_eq!(parsed.entries.len(), 3);

        let first = &parsed.entries[0];
        assert_eq!(first.title, "First story");
        assert_eq!(first.link, "/india/first-story");
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2025, 4, 12));

        // Unparseable pubDate keeps the raw text for the normalizer.
        let second = &parsed.entries[1];
        assert_eq!(second.published, None);
        assert_eq!(second.raw_date.as_deref(), Some("totally not a date"));
    }

    #[test]
    fn test_parse_atom_feed() {
        let parsed = parse_feed(ATOM_DOC.as_bytes()).unwrap();
        assert_eq!(parsed.base.as_deref(), Some("https://example.org"));
        assert_eq!(parsed.entries.len(), 1);

        let entry = &parsed.entries[0];
        assert_eq!(entry.title, "Atom story");
        assert_eq!(entry.link, "https://example.org/atom-story");
        // `updated` stands in when `published` is absent.
        assert_eq!(entry.published, NaiveDate::from_ymd_opt(2025, 4, 12));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(parse_feed(b"this is not a feed document").is_err());
    }
}
