//! Per-source acquisition configuration.
//!
//! Each source is reachable either as a syndication feed or as an HTML
//! listing page — never both. That choice is modeled as a closed tagged
//! enum, [`Source`], whose variants carry only the fields their fetch
//! strategy actually reads; "is this key present" branching happens once,
//! at deserialization, with exhaustiveness checked by the compiler after
//! that.
//!
//! Sources load from a YAML file (one entry per source, selector lists as
//! comma-separated strings), or from the compiled-in default set. The
//! loaded configuration is immutable for the lifetime of the run.

use serde::Deserialize;
use std::fs;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read sources file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse sources file `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A source entry set both `url` and `feed_url`, or neither.
    #[error("source `{name}` must set exactly one of `url` or `feed_url`")]
    AmbiguousEndpoint { name: String },
}

/// One configured news source. The variant is determined solely by which
/// endpoint field the configuration populates.
#[derive(Debug, Clone)]
pub enum Source {
    Feed(FeedSource),
    Listing(ListingSource),
}

impl Source {
    pub fn name(&self) -> &str {
        match self {
            Source::Feed(s) => &s.name,
            Source::Listing(s) => &s.name,
        }
    }
}

/// A source consumed through its syndication feed.
#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: String,
    pub feed_url: String,
    /// Content-container selectors for article pages, in cascade order.
    pub content_selectors: Vec<String>,
    /// Always fetch the article page for body text.
    pub content_fetch: bool,
}

/// A source consumed by scraping an HTML listing page.
#[derive(Debug, Clone)]
pub struct ListingSource {
    pub name: String,
    pub url: String,
    /// Selectors locating one article element each, in cascade order.
    pub article_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub link_selectors: Vec<String>,
    /// Date selectors applied within the listing element.
    pub date_selectors: Vec<String>,
    /// Date selectors applied on the article page when the listing gave none.
    pub article_date_selectors: Vec<String>,
    pub content_selectors: Vec<String>,
    pub content_fetch: bool,
}

/// A source entry as written in the YAML file, before endpoint validation.
#[derive(Debug, Deserialize)]
struct RawSource {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    feed_url: Option<String>,
    #[serde(default)]
    article_selector: String,
    #[serde(default)]
    title_selector: String,
    #[serde(default)]
    link_selector: String,
    #[serde(default)]
    date_selector: String,
    #[serde(default)]
    date_selector_article: String,
    #[serde(default)]
    content_selector: String,
    #[serde(default)]
    content_fetch: bool,
}

impl TryFrom<RawSource> for Source {
    type Error = ConfigError;

    fn try_from(raw: RawSource) -> Result<Self, Self::Error> {
        match (raw.url, raw.feed_url) {
            (None, Some(feed_url)) => Ok(Source::Feed(FeedSource {
                name: raw.name,
                feed_url,
                content_selectors: selector_list(&raw.content_selector),
                content_fetch: raw.content_fetch,
            })),
            (Some(url), None) => {
                let title_selectors = selector_list(&raw.title_selector);
                let link_selectors = selector_list(&raw.link_selector);
                if title_selectors.is_empty() || link_selectors.is_empty() {
                    warn!(
                        source = %raw.name,
                        "Listing source has no title or link selectors; every element will be skipped"
                    );
                }
                Ok(Source::Listing(ListingSource {
                    name: raw.name,
                    url,
                    article_selectors: selector_list(&raw.article_selector),
                    title_selectors,
                    link_selectors,
                    date_selectors: selector_list(&raw.date_selector),
                    article_date_selectors: selector_list(&raw.date_selector_article),
                    content_selectors: selector_list(&raw.content_selector),
                    content_fetch: raw.content_fetch,
                }))
            }
            _ => Err(ConfigError::AmbiguousEndpoint { name: raw.name }),
        }
    }
}

/// Split a comma-separated selector cascade into an ordered list.
///
/// Empty input yields an empty list, never a list with empty entries.
pub fn selector_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load sources from a YAML file.
pub fn load_sources(path: &str) -> Result<Vec<Source>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let raw: Vec<RawSource> = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    raw.into_iter().map(Source::try_from).collect()
}

/// The compiled-in source set, used when no sources file is given.
pub fn default_sources() -> Vec<Source> {
    vec![
        Source::Listing(ListingSource {
            name: "Hindustan Times India".to_string(),
            url: "https://www.hindustantimes.com/india-news".to_string(),
            article_selectors: selector_list(
                "div.cartHolder, section.listingPage > div > div.cartHolder",
            ),
            title_selectors: selector_list("h3 > a"),
            link_selectors: selector_list("h3 > a"),
            date_selectors: selector_list("span.dateTime"),
            article_date_selectors: selector_list("div.dateTime, div.detailInfo span"),
            content_selectors: selector_list("div.storyDetails, div.detail"),
            content_fetch: true,
        }),
        Source::Listing(ListingSource {
            name: "Indian Express India".to_string(),
            url: "https://indianexpress.com/section/india/".to_string(),
            article_selectors: selector_list("div.nation > div.articles"),
            title_selectors: selector_list("h2 > a, h3 > a"),
            link_selectors: selector_list("h2 > a, h3 > a"),
            date_selectors: selector_list("div.date"),
            article_date_selectors: selector_list(
                "span[itemprop='dateModified'], #postinfo_meta span",
            ),
            content_selectors: selector_list("div.story_details, div.full-details"),
            content_fetch: true,
        }),
        feed(
            "Times of India",
            "https://timesofindia.indiatimes.com/rssfeeds/-2128936835.cms",
            "div._s30J.clearfix, div.article_content",
        ),
        feed(
            "The Hindu",
            "https://www.thehindu.com/news/national/feeder/default.rss",
            "div.article-body, div[itemprop='articleBody']",
        ),
        feed(
            "News18",
            "https://www.news18.com/commonfeeds/v1/eng/rss/india.xml",
            "div.article-content, div#article-detail-content",
        ),
        feed(
            "Zee News",
            "https://zeenews.india.com/rss/india-national-news.xml",
            "div.article-content, div.article_content, div.content",
        ),
        feed(
            "India TV News",
            "https://www.indiatvnews.com/rssnews/topstory-india.xml",
            "div.content, div.article-content, div.story-data",
        ),
        feed(
            "FirstPost",
            "https://www.firstpost.com/commonfeeds/v1/mfp/rss/india.xml",
            "div.article-content, div.inner-copy, div.story-content",
        ),
        feed(
            "Tribune",
            "https://publish.tribuneindia.com/newscategory/india/feed/",
            "div.article-content, div.story-content",
        ),
        feed(
            "The Week",
            "https://www.theweek.in/news/india.rss.xml",
            "div.article-content, div.story-content, div.articleBody",
        ),
    ]
}

fn feed(name: &str, feed_url: &str, content_selector: &str) -> Source {
    Source::Feed(FeedSource {
        name: name.to_string(),
        feed_url: feed_url.to_string(),
        content_selectors: selector_list(content_selector),
        content_fetch: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_list_splits_and_trims() {
        assert_eq!(
            selector_list("div.a, div.b , span.c"),
            vec!["div.a", "div.b", "span.c"]
        );
        assert_eq!(selector_list(""), Vec::<String>::new());
        assert_eq!(selector_list(" , ,"), Vec::<String>::new());
    }

    #[test]
    fn test_raw_source_with_feed_url_becomes_feed() {
        let raw: RawSource = serde_yaml::from_str(
            "name: Example\nfeed_url: https://example.com/rss\ncontent_selector: div.body\ncontent_fetch: true\n",
        )
        .unwrap();
        let source = Source::try_from(raw).unwrap();
        match source {
            Source::Feed(feed) => {
                assert_eq!(feed.name, "Example");
                assert_eq!(feed.feed_url, "https://example.com/rss");
                assert_eq!(feed.content_selectors, vec!["div.body"]);
                assert!(feed.content_fetch);
            }
            Source::Listing(_) => panic!("expected feed source"),
        }
    }

    #[test]
    fn test_raw_source_with_url_becomes_listing() {
        let raw: RawSource = serde_yaml::from_str(
            "name: Example\nurl: https://example.com/news\ntitle_selector: h2 > a\nlink_selector: h2 > a\n",
        )
        .unwrap();
        let source = Source::try_from(raw).unwrap();
        assert!(matches!(source, Source::Listing(_)));
    }

    #[test]
    fn test_both_endpoints_rejected() {
        let raw: RawSource = serde_yaml::from_str(
            "name: Example\nurl: https://example.com\nfeed_url: https://example.com/rss\n",
        )
        .unwrap();
        assert!(matches!(
            Source::try_from(raw),
            Err(ConfigError::AmbiguousEndpoint { .. })
        ));
    }

    #[test]
    fn test_neither_endpoint_rejected() {
        let raw: RawSource = serde_yaml::from_str("name: Example\n").unwrap();
        assert!(matches!(
            Source::try_from(raw),
            Err(ConfigError::AmbiguousEndpoint { .. })
        ));
    }

    #[test]
    fn test_default_sources_have_unique_names() {
        let sources = default_sources();
        assert_eq!(sources.len(), 10);
        let mut names: Vec<&str> = sources.iter().map(Source::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), sources.len());
    }
}
