//! Keyword filtering and sentiment classification.
//!
//! The filter stage is the last gate a candidate passes: content is fetched
//! if the source mandates it, the search keyword is matched
//! case-insensitively against title and content, and matching candidates are
//! classified through the external text-classification service. Everything
//! the service can do wrong — blocked prompts, rejected credentials,
//! transport failures, replies that aren't one of the three words it was
//! asked for — is normalized into a [`Sentiment`] label and stored with the
//! article; classification never aborts the run.
//!
//! The classifier client is an explicit injected capability: it is either
//! constructed once at startup (API key present) or absent, and the absence
//! case is a label like any other, not ambient process state.

use crate::extract::fetch_and_extract;
use crate::models::{ArticleCandidate, ArticleContent, ExtractedArticle};
use crate::pipeline::RunContext;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

/// Input text cap for the classification request.
const MAX_PROMPT_CHARS: usize = 8000;

/// Politeness delay before fetching an article page.
pub(crate) const CONTENT_FETCH_DELAY: Duration = Duration::from_millis(200);

/// Courtesy delay after a classification call that reached the service.
const POST_CLASSIFY_DELAY: Duration = Duration::from_millis(500);

/// Transient failures are retried with the usual doubling backoff.
const MAX_RETRIES: usize = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Sentiment label for an article: one of the three substantive classes, or
/// the reason there isn't one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    /// Content was missing or carried an extraction-failure marker; the
    /// service was never called.
    NoContent,
    /// The service replied with something unparseable.
    Unknown,
    /// The service returned no candidates (prompt blocked or empty).
    Blocked,
    /// Credential rejected.
    AuthError,
    /// Any other service failure.
    ApiError,
    /// No classifier was configured for this run.
    ApiKeyMissing,
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::NoContent => "No Content",
            Sentiment::Unknown => "Unknown",
            Sentiment::Blocked => "Blocked",
            Sentiment::AuthError => "Auth Error",
            Sentiment::ApiError => "API Error",
            Sentiment::ApiKeyMissing => "API Key Missing",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
enum CallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unparseable service response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CallError {
    /// Worth another attempt: transport trouble or throttling, not a
    /// rejected credential or a malformed reply.
    fn retryable(&self) -> bool {
        match self {
            CallError::Transport(_) => true,
            CallError::Status { status, .. } => *status == 429 || *status >= 500,
            CallError::Decode(_) => false,
        }
    }

    fn is_auth(&self) -> bool {
        match self {
            CallError::Status { status, body } => {
                *status == 401
                    || *status == 403
                    || body.contains("API key not valid")
                    || body.contains("API_KEY_INVALID")
                    || body.contains("PERMISSION_DENIED")
            }
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// News analysis needs to see harsh content; block nothing.
fn permissive_safety_settings() -> Vec<SafetySetting> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: "BLOCK_NONE",
    })
    .collect()
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Client for the external sentiment service.
#[derive(Debug, Clone)]
pub struct SentimentClient {
    http: Client,
    api_key: String,
}

impl SentimentClient {
    pub fn new(api_key: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, api_key }
    }

    /// Classify the sentiment of article text.
    ///
    /// Infallible by design: every failure mode maps to a [`Sentiment`]
    /// error label.
    pub async fn classify(&self, text: &str) -> Sentiment {
        let truncated = truncate_chars(text, MAX_PROMPT_CHARS);
        let prompt = format!(
            "Analyze the sentiment of the following news article content regarding \
             the main subject mentioned. Respond with only one word: Positive, \
             Negative, or Neutral.\n\nText:\n\"\"\"\n{truncated}\n\"\"\"\n\nSentiment:"
        );

        match self.generate_with_backoff(&prompt).await {
            Ok(response) => {
                let Some(candidate) = response.candidates.first() else {
                    warn!("Sentiment service returned no candidates (blocked or empty)");
                    return Sentiment::Blocked;
                };
                let reply: String = candidate
                    .content
                    .iter()
                    .flat_map(|c| c.parts.iter())
                    .map(|p| p.text.as_str())
                    .collect();
                normalize_reply(&reply)
            }
            Err(e) if e.is_auth() => {
                warn!(error = %e, "Sentiment service rejected credentials");
                Sentiment::AuthError
            }
            Err(e) => {
                warn!(error = %e, "Sentiment service call failed");
                Sentiment::ApiError
            }
        }
    }

    /// One logical call, with doubling backoff plus jitter on transient
    /// failures.
    async fn generate_with_backoff(&self, prompt: &str) -> Result<GenerateResponse, CallError> {
        let mut attempt = 0usize;
        loop {
            match self.generate_once(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempt += 1;
                    if !e.retryable() || attempt > MAX_RETRIES {
                        return Err(e);
                    }
                    let mut delay = BASE_RETRY_DELAY.saturating_mul(1 << (attempt - 1));
                    if delay > MAX_RETRY_DELAY {
                        delay = MAX_RETRY_DELAY;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);
                    warn!(
                        attempt,
                        max = MAX_RETRIES,
                        ?delay,
                        error = %e,
                        "Sentiment call failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn generate_once(&self, prompt: &str) -> Result<GenerateResponse, CallError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 10,
            },
            safety_settings: permissive_safety_settings(),
        };

        let response = self
            .http
            .post(GEMINI_ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Normalize a service reply to a sentiment label.
///
/// Accepts the exact word, any casing, or a reply that merely contains one
/// of the three words; anything else is `Unknown`.
fn normalize_reply(reply: &str) -> Sentiment {
    let lower = reply.trim().to_lowercase();
    match lower.as_str() {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        "neutral" => Sentiment::Neutral,
        _ => {
            if lower.contains("positive") {
                Sentiment::Positive
            } else if lower.contains("negative") {
                Sentiment::Negative
            } else if lower.contains("neutral") {
                Sentiment::Neutral
            } else {
                warn!(reply = %reply.trim(), "Unexpected sentiment reply");
                Sentiment::Unknown
            }
        }
    }
}

/// Case-insensitive keyword containment in title or content text.
pub fn keyword_matches(keyword_lower: &str, title: &str, content: &str) -> bool {
    title.to_lowercase().contains(keyword_lower)
        || content.to_lowercase().contains(keyword_lower)
}

/// Truncate to at most `max` characters, on a character boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Run a today-dated candidate through the filter and classifier.
///
/// `prefetched` carries content the listing extractor already pulled from
/// the article page, so that page is fetched at most once per candidate;
/// feed candidates arrive without it and are fetched here when the source
/// mandates content. Returns `None` when the keyword filter drops the
/// candidate — the majority outcome, and not an error.
pub async fn process_candidate(
    ctx: &RunContext,
    content_selectors: &[String],
    content_fetch: bool,
    candidate: ArticleCandidate,
    prefetched: Option<ArticleContent>,
) -> Option<ExtractedArticle> {
    let content = match prefetched {
        Some(content) => content,
        None if content_fetch => {
            sleep(CONTENT_FETCH_DELAY).await;
            match fetch_and_extract(&ctx.fetcher, &candidate.link, content_selectors).await {
                Ok(text) => ArticleContent::Extracted(text),
                Err(e) => {
                    debug!(
                        source = %candidate.source,
                        url = %candidate.link,
                        error = %e,
                        "Content extraction failed; keeping candidate with failure marker"
                    );
                    ArticleContent::Failed(e)
                }
            }
        }
        None => ArticleContent::NotFetched,
    };

    // The rendered content (markers included) participates in matching,
    // alongside the title.
    if !keyword_matches(&ctx.keyword, &candidate.title, &content.to_string()) {
        debug!(
            source = %candidate.source,
            title = %candidate.title,
            "Candidate dropped by keyword filter"
        );
        return None;
    }

    let sentiment = if !content.is_usable() {
        Sentiment::NoContent
    } else if let Some(client) = &ctx.classifier {
        info!(source = %candidate.source, title = %candidate.title, "Classifying sentiment");
        let text = format!("Title: {}\n\nContent: {}", candidate.title, content.text());
        let sentiment = client.classify(&text).await;
        if !matches!(sentiment, Sentiment::ApiError | Sentiment::AuthError) {
            sleep(POST_CLASSIFY_DELAY).await;
        }
        sentiment
    } else {
        Sentiment::ApiKeyMissing
    };

    Some(ExtractedArticle {
        source: candidate.source,
        title: candidate.title,
        url: candidate.link,
        date: candidate.date,
        content,
        sentiment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_filter_is_case_insensitive() {
        // Title-only match is enough.
        assert!(keyword_matches("modi", "Modi inaugurates new rail line", ""));
        assert!(keyword_matches("modi", "PM MODI speaks", "unrelated body"));
        assert!(keyword_matches("modi", "unrelated title", "a speech by Modi today"));
        assert!(!keyword_matches("modi", "unrelated title", "unrelated body"));
    }

    #[test]
    fn test_normalize_reply_exact_words() {
        assert_eq!(normalize_reply("Positive"), Sentiment::Positive);
        assert_eq!(normalize_reply(" negative \n"), Sentiment::Negative);
        assert_eq!(normalize_reply("NEUTRAL"), Sentiment::Neutral);
    }

    #[test]
    fn test_normalize_reply_substring_fallback() {
        assert_eq!(
            normalize_reply("The sentiment is Positive."),
            Sentiment::Positive
        );
        assert_eq!(normalize_reply("negative overall"), Sentiment::Negative);
    }

    #[test]
    fn test_normalize_reply_unknown() {
        assert_eq!(normalize_reply("mixed"), Sentiment::Unknown);
        assert_eq!(normalize_reply(""), Sentiment::Unknown);
    }

    #[test]
    fn test_sentiment_labels() {
        assert_eq!(Sentiment::NoContent.label(), "No Content");
        assert_eq!(Sentiment::AuthError.label(), "Auth Error");
        assert_eq!(Sentiment::ApiError.label(), "API Error");
        assert_eq!(Sentiment::ApiKeyMissing.label(), "API Key Missing");
        assert_eq!(Sentiment::Positive.to_string(), "Positive");
    }

    #[test]
    fn test_truncate_chars_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("abcdef", 4), "abcd");
        assert_eq!(truncate_chars("abc", 10), "abc");
        // Multi-byte characters must not be split.
        assert_eq!(truncate_chars("ααααα", 3), "ααα");
    }

    #[test]
    fn test_retryability() {
        assert!(
            CallError::Status {
                status: 429,
                body: String::new()
            }
            .retryable()
        );
        assert!(
            CallError::Status {
                status: 503,
                body: String::new()
            }
            .retryable()
        );
        assert!(
            !CallError::Status {
                status: 403,
                body: String::new()
            }
            .retryable()
        );
    }

    #[test]
    fn test_auth_detection() {
        let e = CallError::Status {
            status: 400,
            body: "API key not valid. Please pass a valid API key.".to_string(),
        };
        assert!(e.is_auth());
        assert!(
            CallError::Status {
                status: 403,
                body: String::new()
            }
            .is_auth()
        );
    }
}
