//! HTTP retrieval with timeout and content-type validation.
//!
//! Every extraction path in the pipeline goes through [`Fetcher::fetch`]:
//! listing pages, feed documents, and individual article pages. A fetch
//! either yields decoded text or a [`FetchError`]; callers never branch on
//! the error variant, only log it, since every failure mode means the same
//! thing downstream (skip this candidate or source).

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Browser-identifying header sent with every request. Several of the
/// configured sources serve bot traffic an interstitial or a 403 without it.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-request timeout. Slow sources are abandoned, not waited out.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// A failed retrieval. The variants exist so logs can say what happened;
/// control flow treats all of them identically.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: connect error, timeout, TLS, etc.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response carried a content type that is neither HTML nor XML.
    #[error("unexpected content type `{0}`")]
    ContentType(String),
}

/// Shared HTTP client for all workers.
///
/// Cheap to clone; the inner `reqwest::Client` is an `Arc` around a
/// connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Retrieve a URL and return its body as text.
    ///
    /// The response must be a success status and declare an HTML- or
    /// XML-compatible content type (`text/html`, `application/xml`,
    /// `application/rss+xml`, ...). Bodies are decoded leniently: invalid
    /// UTF-8 sequences are replaced rather than rejected, since news sites
    /// routinely mislabel their encodings.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !(content_type.contains("html") || content_type.contains("xml")) {
            warn!(%url, %content_type, "Skipping non-HTML/XML response");
            return Err(FetchError::ContentType(content_type));
        }

        let bytes = response.bytes().await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        debug!(%url, bytes = bytes.len(), "Fetched");
        Ok(body)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
