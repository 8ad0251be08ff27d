//! Command-line interface definitions for `article_reveal`.
//!
//! All options can be provided via command-line flags or environment variables.

use crate::reveal::resolver::AwaitStrategy;
use clap::{Parser, ValueEnum};

/// How the mid-article slot waits for its container.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Poll,
    Observe,
}

impl StrategyArg {
    /// Strategy with the production timings.
    pub fn to_strategy(self) -> AwaitStrategy {
        match self {
            StrategyArg::Poll => AwaitStrategy::default(),
            StrategyArg::Observe => AwaitStrategy::Observe { timeout_ms: 2000 },
        }
    }
}

/// Fetch an article, render it into a headless page and scroll through it,
/// printing what the reveal controller did as JSON.
///
/// # Examples
///
/// ```sh
/// article_reveal big-news-today-abc123
///
/// # Narrow viewport, MGID ads, observe strategy for the mid slot
/// article_reveal big-news-today-abc123 --viewport-width 390 --mgid --strategy observe
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Article slug; the id is the part after the last '-'
    pub slug: String,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "ARTICLE_REVEAL_CONFIG")]
    pub config: Option<String>,

    /// Base URL of the article API
    #[arg(long, env = "APP_API", default_value = "https://apisport.vbonews.com")]
    pub api_base_url: String,

    /// Base URL of the JSON backups (`{base}/{id}.json`)
    #[arg(long, env = "BACKUP_BASE_URL", default_value = "https://file.lifenews247.com/sportnews/backup")]
    pub backup_base_url: String,

    #[arg(long, default_value_t = 1280.0)]
    pub viewport_width: f64,

    #[arg(long, default_value_t = 800.0)]
    pub viewport_height: f64,

    /// Pixels scrolled per simulated frame
    #[arg(long, default_value_t = 120.0)]
    pub scroll_step: f64,

    /// Force MGID widgets regardless of the config
    #[arg(long)]
    pub mgid: bool,

    /// Override the mid-article discovery strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["article_reveal", "big-news-today-abc123"]);

        assert_eq!(cli.slug, "big-news-today-abc123");
        assert_eq!(cli.viewport_width, 1280.0);
        assert_eq!(cli.scroll_step, 120.0);
        assert!(!cli.mgid);
        assert!(cli.strategy.is_none());
        assert_eq!(cli.backup_base_url, "https://file.lifenews247.com/sportnews/backup");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "article_reveal",
            "story-abc",
            "-c",
            "/tmp/reveal.yaml",
            "--viewport-width",
            "390",
            "--mgid",
            "--strategy",
            "observe",
        ]);

        assert_eq!(cli.config.as_deref(), Some("/tmp/reveal.yaml"));
        assert_eq!(cli.viewport_width, 390.0);
        assert!(cli.mgid);
        assert_eq!(
            cli.strategy.map(StrategyArg::to_strategy),
            Some(AwaitStrategy::Observe { timeout_ms: 2000 })
        );
    }
}
