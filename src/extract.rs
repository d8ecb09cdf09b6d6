//! Best-effort article body extraction via a selector cascade.
//!
//! No single selector stays reliable for long against independently operated
//! news sites, so extraction is deliberately approximate and self-healing:
//! the source's own content selectors are tried in order, then a fixed list
//! of commonly used content containers, and the text inside the winning
//! container is filtered by a paragraph-density heuristic rather than parsed
//! precisely.
//!
//! `scraper`'s `Html` is not `Send`, so everything here is synchronous over
//! already-fetched markup; workers fetch first, then call in. The async
//! [`fetch_and_extract`] wrapper pairs the two for callers that need both.

use crate::fetch::{FetchError, Fetcher};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Paragraphs at or below this many characters are noise (bylines, labels).
const MIN_PARAGRAPH_CHARS: usize = 40;

/// A paragraph must keep more than this many non-anchor characters;
/// link-heavy paragraphs are navigation, not content.
const MIN_NON_LINK_CHARS: usize = 20;

/// Minimum length for the flattened-container fallback text.
const MIN_FALLBACK_CHARS: usize = 100;

/// Source-independent content containers, tried after the source's own
/// selectors fail. Accumulated from the sites this has been pointed at.
const FALLBACK_CONTENT_SELECTORS: &[&str] = &[
    r#"div[itemprop="articleBody"]"#,
    "div.article-body",
    "div.story-body",
    "div.entry-content",
    "div.main-content",
    "div.story_details",
    "div.story-details",
    "div.article-content",
    "div#storybody",
    "article",
    "main",
    r#"div[role="main"]"#,
    "div.article-body-content",
    "div.abp-story-detail",
    "div._s30J.clearfix",
    "div.article_content",
    "div.content",
    "div.story-data",
    "div.inner-copy",
    "div.articleBody",
];

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));

static FALLBACK_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    FALLBACK_CONTENT_SELECTORS
        .iter()
        .map(|raw| Selector::parse(raw).expect("valid fallback selector"))
        .collect()
});

/// Why extraction produced no body text. Travels with the candidate as a
/// failure marker (see `ArticleContent::Failed`) instead of aborting it.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The article page itself could not be retrieved. Hard failure for the
    /// candidate; the fetch is not retried.
    #[error("could not fetch article page: {0}")]
    Fetch(#[from] FetchError),

    /// A container matched but everything inside it was filtered out.
    #[error("content area found (selector `{selector}`), but no usable text extracted")]
    NoUsableText { selector: String },

    /// No selector, configured or fallback, matched anything.
    #[error("could not find content area using any selector")]
    NoContentArea,
}

/// Fetch an article page and extract its body text in one step.
pub async fn fetch_and_extract(
    fetcher: &Fetcher,
    url: &Url,
    primary_selectors: &[String],
) -> Result<String, ExtractError> {
    let html = fetcher.fetch(url.as_str()).await?;
    extract_content(&html, primary_selectors, url.as_str())
}

/// Extract article body text from fetched page markup.
///
/// Tries each primary selector in order, then the fixed fallback list.
/// Within the winning container, paragraphs that are direct children are
/// preferred over arbitrary descendants; each surviving paragraph must be
/// long enough, free of advertisement / "also read" markers, not sit inside
/// a figure or aside, and not consist mostly of link text. Survivors are
/// joined with blank lines; an empty join falls back to the container's
/// entire flattened text when that is long enough to plausibly be the story.
pub fn extract_content(
    html: &str,
    primary_selectors: &[String],
    url: &str,
) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);
    let (container, used_selector) =
        find_container(&document, primary_selectors, url).ok_or(ExtractError::NoContentArea)?;

    let mut parts: Vec<String> = Vec::new();
    for paragraph in collect_paragraphs(container) {
        if inside_caption(paragraph, container) {
            continue;
        }
        let text = element_text(paragraph);
        let char_count = text.chars().count();
        if char_count <= MIN_PARAGRAPH_CHARS {
            continue;
        }
        if text.contains("Advertisement") || text.to_lowercase().contains("also read:") {
            continue;
        }
        let link_chars: usize = paragraph
            .select(&ANCHOR)
            .map(|a| element_text(a).chars().count())
            .sum();
        if char_count.saturating_sub(link_chars) <= MIN_NON_LINK_CHARS {
            continue;
        }
        parts.push(text);
    }

    let content = parts.join("\n\n");
    if !content.is_empty() {
        return Ok(content);
    }

    // Last resort: the container's whole text, if there is enough of it.
    let flattened = element_text(container);
    if flattened.chars().count() > MIN_FALLBACK_CHARS {
        warn!(%url, selector = %used_selector, "Extracted content via flattened container text");
        return Ok(flattened);
    }

    Err(ExtractError::NoUsableText {
        selector: used_selector,
    })
}

/// First container matched by the primary cascade, then the fallback list.
fn find_container<'a>(
    document: &'a Html,
    primary_selectors: &[String],
    url: &str,
) -> Option<(ElementRef<'a>, String)> {
    for raw in primary_selectors {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = raw, "Ignoring unparseable content selector");
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            debug!(%url, selector = raw, "Matched primary content selector");
            return Some((element, raw.to_string()));
        }
    }

    if !primary_selectors.is_empty() {
        debug!(%url, "Primary content selectors failed; trying fallbacks");
    }
    for (raw, selector) in FALLBACK_CONTENT_SELECTORS.iter().zip(FALLBACK_SELECTORS.iter()) {
        if let Some(element) = document.select(selector).next() {
            debug!(%url, selector = raw, "Matched fallback content selector");
            return Some((element, (*raw).to_string()));
        }
    }
    None
}

/// Direct `<p>` children of the container, else all descendant paragraphs.
fn collect_paragraphs(container: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let direct: Vec<ElementRef> = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "p")
        .collect();
    if !direct.is_empty() {
        return direct;
    }
    container.select(&PARAGRAPH).collect()
}

/// True when the paragraph sits under a figure/figcaption/aside somewhere
/// between itself and the container.
fn inside_caption(paragraph: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    for ancestor in paragraph.ancestors() {
        if ancestor.id() == container.id() {
            break;
        }
        if let Some(element) = ElementRef::wrap(ancestor) {
            if matches!(element.value().name(), "figure" | "figcaption" | "aside") {
                return true;
            }
        }
    }
    false
}

/// Stripped text of every text node under the element, space-joined.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
