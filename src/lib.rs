//! rag-crawler: a polite crawler that turns a documentation site into Markdown
//!
//! This crate walks a single site breadth-first from a seed URL, respecting
//! robots.txt and per-host rate limits, strips boilerplate from each page,
//! converts the main content to Markdown and writes one front-matter record
//! per changed page for a downstream ingestion stage.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use std::time::Duration;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        timeout: bool,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Rate limited (429) by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect from {url} leaves the crawl domain: {location}")]
    RedirectOffDomain { url: String, location: String },

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Crawl state at {path} is unreadable: {message} (rerun with --fresh to discard it)")]
    StateCorruption { path: String, message: String },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TargetState,
        to: state::TargetState,
    },

    #[error("Storage error: {0}")]
    Storage(storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlerError {
    /// Returns true for failures worth retrying with backoff:
    /// timeouts, connection errors and 5xx responses.
    ///
    /// 429 is deliberately not transient; it is requeued instead of retried.
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlerError::Network { .. } => true,
            CrawlerError::HttpStatus { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}

impl From<storage::StorageError> for CrawlerError {
    fn from(e: storage::StorageError) -> Self {
        match e {
            storage::StorageError::Corrupt { path, message } => {
                CrawlerError::StateCorruption { path, message }
            }
            other => CrawlerError::Storage(other),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use content::{to_markdown, ContentExtractor, ExtractedContent};
pub use crawler::{run_crawl, Coordinator};
pub use output::CrawlStats;
pub use state::{fingerprint, has_changed, CrawlState, CrawlTarget, TargetState};
pub use url::{canonicalize, UrlNormalizer};
