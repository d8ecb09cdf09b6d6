//! HTML listing-page extraction.
//!
//! A listing page enumerates many articles, each needing element-level
//! extraction: the configured article-element selectors (with generic
//! fallbacks) locate the items, and first-match cascades pull out title,
//! link, and an optional listing date. When the listing carries no usable
//! date, or the source mandates body text, the article page is fetched —
//! once per candidate — to serve both content extraction and article-page
//! date resolution.

use crate::classify::{CONTENT_FETCH_DELAY, process_candidate};
use crate::config::ListingSource;
use crate::dates;
use crate::extract::{self, element_text};
use crate::models::{ArticleCandidate, ArticleContent, LogEvent, WorkerEvent};
use crate::pipeline::RunContext;
use crate::sources::resolve_link;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

static ARTICLE_ELEMENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article").expect("valid selector"));

/// Generic listing-item shapes, tried when both the configured selectors
/// and bare `<article>` elements come up empty.
static GENERIC_ITEMS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"div[class*="item"], div[class*="post"], li[class*="item"], li[class*="post"]"#,
    )
    .expect("valid selector")
});

/// An article discovered on the listing page, before date resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListingEntry {
    pub title: String,
    pub link: Url,
    /// Raw date text from the listing element, `datetime` attribute
    /// preferred over element text.
    pub date_text: Option<String>,
}

/// Scrape one listing source; returns the number of articles that matched
/// the keyword filter.
pub(crate) async fn scrape(
    ctx: &RunContext,
    source: &ListingSource,
    events: &UnboundedSender<WorkerEvent>,
    seen: &mut HashSet<String>,
) -> usize {
    info!(url = %source.url, "Using HTML listing page");

    let html = match ctx.fetcher.fetch(&source.url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Failed to fetch listing page");
            let _ = events.send(WorkerEvent::Log(LogEvent::error(
                &source.name,
                format!("failed to fetch listing page: {e}"),
            )));
            return 0;
        }
    };

    let entries = discover_entries(&html, source);
    if entries.is_empty() {
        let _ = events.send(WorkerEvent::Log(LogEvent::error(
            &source.name,
            "no articles found on listing page (all selectors failed)",
        )));
        return 0;
    }
    info!(count = entries.len(), "Potential article elements on listing page");

    let mut matched = 0;
    for entry in entries {
        if !seen.insert(entry.link.as_str().to_string()) {
            continue;
        }

        let mut date = entry.date_text.as_deref().and_then(|text| {
            dates::normalize(text, &format!("{} (listing)", source.name), ctx.today)
        });
        let mut prefetched: Option<ArticleContent> = None;

        // One article-page fetch covers both body text and a missing date.
        let need_page = source.content_fetch
            || (date.is_none() && !source.article_date_selectors.is_empty());
        if need_page {
            sleep(CONTENT_FETCH_DELAY).await;
            match ctx.fetcher.fetch(entry.link.as_str()).await {
                Ok(article_html) => {
                    if source.content_fetch {
                        prefetched = Some(
                            match extract::extract_content(
                                &article_html,
                                &source.content_selectors,
                                entry.link.as_str(),
                            ) {
                                Ok(text) => ArticleContent::Extracted(text),
                                Err(e) => ArticleContent::Failed(e),
                            },
                        );
                    }
                    if date.is_none() && !source.article_date_selectors.is_empty() {
                        if let Some(text) =
                            find_date_text(&article_html, &source.article_date_selectors)
                        {
                            date = dates::normalize(
                                &text,
                                &format!("{} (article)", source.name),
                                ctx.today,
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %entry.link, error = %e, "Could not fetch article page for details");
                    if source.content_fetch {
                        prefetched = Some(ArticleContent::Failed(e.into()));
                    }
                    // The listing date string gets one more chance when the
                    // article page is unreachable.
                    if date.is_none() {
                        if let Some(text) = entry.date_text.as_deref() {
                            date = dates::normalize(
                                text,
                                &format!("{} (listing fallback)", source.name),
                                ctx.today,
                            );
                        }
                    }
                }
            }
        }

        if date != Some(ctx.today) {
            debug!(url = %entry.link, ?date, "Skipping candidate not dated today");
            continue;
        }

        let candidate = ArticleCandidate {
            source: source.name.clone(),
            title: entry.title,
            link: entry.link,
            date: ctx.today,
        };
        if let Some(article) = process_candidate(
            ctx,
            &source.content_selectors,
            source.content_fetch,
            candidate,
            prefetched,
        )
        .await
        {
            let _ = events.send(WorkerEvent::Article(Box::new(article)));
            matched += 1;
        }
    }
    matched
}

/// Discover candidate article entries on a listing page.
///
/// Deterministic over the markup: running this twice over the same page
/// yields the same entries in the same order.
pub(crate) fn discover_entries(html: &str, source: &ListingSource) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);

    let mut elements: Vec<ElementRef> = Vec::new();
    for raw in &source.article_selectors {
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = %raw, "Ignoring unparseable article selector");
            continue;
        };
        elements.extend(document.select(&selector));
    }
    if elements.is_empty() {
        debug!(source = %source.name, "Primary article selectors failed; trying fallbacks");
        elements = document.select(&ARTICLE_ELEMENT).collect();
        if elements.is_empty() {
            elements = document.select(&GENERIC_ITEMS).collect();
        }
    }

    let mut entries = Vec::new();
    for element in elements {
        let title = first_match(element, &source.title_selectors)
            .map(element_text)
            .unwrap_or_default();
        let href = first_match(element, &source.link_selectors)
            .and_then(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.to_lowercase().starts_with("javascript:"))
            .unwrap_or_default();
        if title.is_empty() || href.is_empty() {
            continue;
        }
        let Some(link) = resolve_link(Some(&source.url), href) else {
            debug!(source = %source.name, href, "Skipping invalid link after join");
            continue;
        };

        let date_text = first_match(element, &source.date_selectors)
            .map(|el| match el.value().attr("datetime") {
                Some(dt) if !dt.trim().is_empty() => dt.trim().to_string(),
                _ => element_text(el),
            })
            .filter(|text| !text.is_empty());

        entries.push(ListingEntry {
            title,
            link,
            date_text,
        });
    }
    entries
}

/// First element matched by the cascade, scoped to `scope`'s descendants.
fn first_match<'a>(scope: ElementRef<'a>, selectors: &[String]) -> Option<ElementRef<'a>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            return Some(element);
        }
    }
    None
}

/// Pull the date string off an article page via the configured cascade,
/// preferring `datetime` and `content` attributes over element text.
pub(crate) fn find_date_text(html: &str, selectors: &[String]) -> Option<String> {
    let document = Html::parse_document(html);
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let attr = element
                .value()
                .attr("datetime")
                .or_else(|| element.value().attr("content"))
                .map(str::trim)
                .filter(|a| !a.is_empty());
            let text = match attr {
                Some(attr) => attr.to_string(),
                None => element_text(element),
            };
            return Some(text).filter(|t| !t.is_empty());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::selector_list;

    fn test_source() -> ListingSource {
        ListingSource {
            name: "Example".to_string(),
            url: "https://example.com/section/india/".to_string(),
            article_selectors: selector_list("div.card"),
            title_selectors: selector_list("h2 > a, h3 > a"),
            link_selectors: selector_list("h2 > a, h3 > a"),
            date_selectors: selector_list("span.when"),
            article_date_selectors: selector_list("meta.published, span.stamp"),
            content_selectors: selector_list("div.story"),
            content_fetch: false,
        }
    }

    const LISTING_PAGE: &str = r#"<html><body>
        <div class="card">
            <h2><a href="/india/story-one">Story one</a></h2>
            <span class="when">Apr 12, 2025</span>
        </div>
        <div class="card">
            <h3><a href="https://example.com/india/story-two">Story two</a></h3>
            <span class="when" datetime="2025-04-12T08:00:00">8 AM</span>
        </div>
        <div class="card">
            <h2><a href="javascript:void(0)">Scripted pseudo-link</a></h2>
        </div>
        <div class="card">
            <h2>No link at all</h2>
        </div>
    </body></html>"#;

    #[test]
    fn test_discover_entries() {
        let entries = discover_entries(LISTING_PAGE, &test_source());
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Story one");
        assert_eq!(entries[0].link.as_str(), "https://example.com/india/story-one");
        assert_eq!(entries[0].date_text.as_deref(), Some("Apr 12, 2025"));

        // The datetime attribute wins over the element text.
        assert_eq!(entries[1].date_text.as_deref(), Some("2025-04-12T08:00:00"));
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let first = discover_entries(LISTING_PAGE, &test_source());
        let second = discover_entries(LISTING_PAGE, &test_source());
        assert_eq!(first, second);
    }

    #[test]
    fn test_article_element_fallback() {
        let html = r#"<html><body>
            <article><h2><a href="/a">Fallback story</a></h2></article>
        </body></html>"#;
        let entries = discover_entries(html, &test_source());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Fallback story");
    }

    #[test]
    fn test_generic_item_fallback() {
        let html = r#"<html><body>
            <li class="news-item"><h3><a href="/b">Generic item story</a></h3></li>
        </body></html>"#;
        let entries = discover_entries(html, &test_source());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link.as_str(), "https://example.com/b");
    }

    #[test]
    fn test_find_date_text_prefers_attributes() {
        let html = r#"<html><head>
            <meta class="published" content="2025-04-12T09:00:00+05:30">
        </head><body><span class="stamp">Apr 12, 2025</span></body></html>"#;
        let selectors = selector_list("meta.published, span.stamp");
        assert_eq!(
            find_date_text(html, &selectors).as_deref(),
            Some("2025-04-12T09:00:00+05:30")
        );
    }

    #[test]
    fn test_find_date_text_falls_back_to_element_text() {
        let html = r#"<html><body><span class="stamp">12 April 2025</span></body></html>"#;
        let selectors = selector_list("meta.published, span.stamp");
        assert_eq!(find_date_text(html, &selectors).as_deref(), Some("12 April 2025"));
    }

    #[test]
    fn test_find_date_text_stops_at_first_matching_element() {
        // An empty first match is not papered over by later selectors.
        let html = r#"<html><body>
            <span class="stamp"></span>
            <span class="other">Apr 12, 2025</span>
        </body></html>"#;
        let selectors = selector_list("span.stamp, span.other");
        assert_eq!(find_date_text(html, &selectors), None);
    }
}
