//! SQLite archive for matched articles.
//!
//! One table, keyed by an autoincrement id, with a permanent uniqueness
//! constraint on the article URL. Inserts use `INSERT OR IGNORE`: a
//! duplicate URL is not an error, it is a distinct outcome, reported
//! separately from true insertions and true failures. Saving happens
//! sequentially after the concurrent phase — single writer, one record at
//! a time.

use crate::models::ExtractedArticle;
use rusqlite::{Connection, params};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// What happened to one insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The URL already exists; the row was left untouched.
    Ignored,
}

/// Outcome counts for one save pass, surfaced in the run tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub ignored: usize,
    pub errors: usize,
}

/// Handle on the archive database.
pub struct Archive {
    conn: Connection,
}

impl Archive {
    /// Open (or create) the archive at `path` and ensure the schema exists.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                article_date TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                content TEXT,
                sentiment TEXT
            )",
            [],
        )?;
        info!(path, "Archive ready");
        Ok(Self { conn })
    }

    /// Insert one article; a duplicate URL is silently ignored.
    pub fn insert(&self, article: &ExtractedArticle) -> Result<InsertOutcome, StoreError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO articles (source, article_date, title, url, content, sentiment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                article.source,
                article.date.format("%Y-%m-%d").to_string(),
                article.title,
                article.url.as_str(),
                article.content.to_string(),
                article.sentiment.label(),
            ],
        )?;
        Ok(if changed > 0 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Ignored
        })
    }

    /// Insert every article, tallying outcomes. Individual failures are
    /// logged and counted; they never abort the remaining inserts.
    pub fn save_all(&self, articles: &[ExtractedArticle]) -> SaveSummary {
        let mut summary = SaveSummary::default();
        for article in articles {
            match self.insert(article) {
                Ok(InsertOutcome::Inserted) => summary.inserted += 1,
                Ok(InsertOutcome::Ignored) => {
                    debug!(url = %article.url, "Duplicate URL ignored");
                    summary.ignored += 1;
                }
                Err(e) => {
                    error!(url = %article.url, error = %e, "Failed to insert article");
                    summary.errors += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Sentiment;
    use crate::models::ArticleContent;
    use chrono::NaiveDate;
    use url::Url;

    fn article(url: &str) -> ExtractedArticle {
        ExtractedArticle {
            source: "Example".to_string(),
            title: "A story".to_string(),
            url: Url::parse(url).unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 4, 12).unwrap(),
            content: ArticleContent::Extracted("Body text".to_string()),
            sentiment: Sentiment::Neutral,
        }
    }

    fn row_count(archive: &Archive) -> i64 {
        archive
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_duplicate_url_is_ignored_not_an_error() {
        let archive = Archive::open(":memory:").unwrap();
        let article = article("https://example.com/story");

        assert_eq!(archive.insert(&article).unwrap(), InsertOutcome::Inserted);
        assert_eq!(archive.insert(&article).unwrap(), InsertOutcome::Ignored);
        assert_eq!(row_count(&archive), 1);
    }

    #[test]
    fn test_save_all_tallies_outcomes() {
        let archive = Archive::open(":memory:").unwrap();
        let articles = vec![
            article("https://example.com/one"),
            article("https://example.com/two"),
            article("https://example.com/one"),
        ];

        let summary = archive.save_all(&articles);
        assert_eq!(
            summary,
            SaveSummary {
                inserted: 2,
                ignored: 1,
                errors: 0
            }
        );
        assert_eq!(row_count(&archive), 2);
    }

    #[test]
    fn test_stored_fields_round_trip() {
        let archive = Archive::open(":memory:").unwrap();
        archive.insert(&article("https://example.com/story")).unwrap();

        let (date, sentiment): (String, String) = archive
            .conn
            .query_row(
                "SELECT article_date, sentiment FROM articles LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(date, "2025-04-12");
        assert_eq!(sentiment, "Neutral");
    }
}
