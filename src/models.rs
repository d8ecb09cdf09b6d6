//! Core data types flowing through the pipeline.
//!
//! This module defines the units of work exchanged between the extraction
//! stages and the consumer:
//! - [`ArticleCandidate`]: a discovered article confirmed to be from today,
//!   not yet filtered or classified
//! - [`ArticleContent`]: extracted body text, an extraction-failure marker,
//!   or "never fetched"
//! - [`ExtractedArticle`]: the terminal unit emitted to the event stream
//! - [`LogEvent`] / [`Severity`]: per-source progress and failure reporting
//! - [`WorkerEvent`]: what source workers push onto the shared channel

use crate::classify::Sentiment;
use crate::extract::ExtractError;
use chrono::NaiveDate;
use std::fmt;
use url::Url;

/// A discovered article whose date resolved to the run's "today".
///
/// Created and discarded within one source worker's run; only candidates
/// passing the keyword filter survive it as [`ExtractedArticle`]s.
#[derive(Debug, Clone)]
pub struct ArticleCandidate {
    /// Configured name of the source that discovered this article.
    pub source: String,
    pub title: String,
    /// Absolute article URL; also the dedup key.
    pub link: Url,
    pub date: NaiveDate,
}

/// Body text for an article, or the reason there isn't any.
///
/// Extraction failures travel with the article rather than aborting it, so
/// filtering and logging stay informative. The rendered text of all three
/// states participates in keyword matching; only `Extracted` text is ever
/// sent to the sentiment service.
#[derive(Debug)]
pub enum ArticleContent {
    Extracted(String),
    Failed(ExtractError),
    NotFetched,
}

impl ArticleContent {
    /// True when real body text was extracted (not a failure marker).
    pub fn is_usable(&self) -> bool {
        matches!(self, ArticleContent::Extracted(_))
    }

    /// Extracted text when present, empty otherwise.
    pub fn text(&self) -> &str {
        match self {
            ArticleContent::Extracted(text) => text,
            _ => "",
        }
    }
}

impl fmt::Display for ArticleContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleContent::Extracted(text) => f.write_str(text),
            ArticleContent::Failed(e) => write!(f, "Error: {e}"),
            ArticleContent::NotFetched => f.write_str("Content not fetched."),
        }
    }
}

/// A keyword-matched, classified article — the pipeline's terminal unit.
#[derive(Debug)]
pub struct ExtractedArticle {
    pub source: String,
    pub title: String,
    pub url: Url,
    pub date: NaiveDate,
    pub content: ArticleContent,
    pub sentiment: Sentiment,
}

/// Severity of a [`LogEvent`], mapped to tracing levels by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A free-text status message tagged with a source name; not an article.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub source: String,
    pub severity: Severity,
    pub message: String,
}

impl LogEvent {
    pub fn info(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn success(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn error(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// One item on the shared worker-to-consumer channel.
#[derive(Debug)]
pub enum WorkerEvent {
    Article(Box<ExtractedArticle>),
    Log(LogEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_content_usability() {
        assert!(ArticleContent::Extracted("body".to_string()).is_usable());
        assert!(!ArticleContent::NotFetched.is_usable());
        assert!(!ArticleContent::Failed(ExtractError::NoContentArea).is_usable());
    }

    #[test]
    fn test_article_content_markers_render() {
        assert_eq!(ArticleContent::NotFetched.to_string(), "Content not fetched.");
        let failed = ArticleContent::Failed(ExtractError::NoContentArea);
        assert!(failed.to_string().starts_with("Error: "));
    }

    #[test]
    fn test_log_event_constructors() {
        let event = LogEvent::error("The Hindu", "fetch failed");
        assert_eq!(event.source, "The Hindu");
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.message, "fetch failed");
    }
}
