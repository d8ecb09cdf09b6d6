//! Command-line interface definitions for news_harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Options with environment-variable fallbacks can be provided either way.

use clap::Parser;

/// Command-line arguments for the news_harvest application.
///
/// # Examples
///
/// ```sh
/// # Default run: built-in sources, keyword "modi", ./news_archive.db
/// news_harvest
///
/// # Custom sources file and keyword
/// news_harvest --sources sources.yaml --keyword election
///
/// # Scrape and classify without touching the archive
/// news_harvest --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the SQLite archive database
    #[arg(short, long, default_value = "news_archive.db")]
    pub db_path: String,

    /// Keyword an article must mention (in title or content) to be kept
    #[arg(short, long, default_value = "modi")]
    pub keyword: String,

    /// Optional YAML sources file; the built-in source set is used otherwise
    #[arg(short, long)]
    pub sources: Option<String>,

    /// Google AI API key for sentiment classification
    #[arg(long, env = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,

    /// Scrape and classify, but skip writing to the archive
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["news_harvest"]);
        assert_eq!(cli.db_path, "news_archive.db");
        assert_eq!(cli.keyword, "modi");
        assert!(cli.sources.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "news_harvest",
            "-d",
            "/tmp/archive.db",
            "-k",
            "election",
            "-s",
            "sources.yaml",
        ]);
        assert_eq!(cli.db_path, "/tmp/archive.db");
        assert_eq!(cli.keyword, "election");
        assert_eq!(cli.sources.as_deref(), Some("sources.yaml"));
    }

    #[test]
    fn test_cli_dry_run_flag() {
        let cli = Cli::parse_from(["news_harvest", "--dry-run"]);
        assert!(cli.dry_run);
    }
}
