use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL the traversal starts from; also fixes the crawl domain
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Maximum link depth from the seed (seed is depth 0)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Minimum seconds between requests to the same host
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Wall-clock timeout for each request (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff in seconds, doubled on every retry
    #[serde(rename = "retry-backoff", default = "default_retry_backoff")]
    pub retry_backoff: f64,

    /// Extra host delay after a 429 that carries no Retry-After (seconds)
    #[serde(rename = "rate-limit-backoff", default = "default_rate_limit_backoff")]
    pub rate_limit_backoff: f64,

    /// How many times one target may be requeued after a 429
    #[serde(
        rename = "max-rate-limit-requeues",
        default = "default_max_rate_limit_requeues"
    )]
    pub max_rate_limit_requeues: u32,

    /// Upper bound on waits a server can impose through Retry-After or
    /// Crawl-delay (seconds)
    #[serde(rename = "max-server-delay", default = "default_max_server_delay")]
    pub max_server_delay: f64,

    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,

    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Persist the crawl state every N processed targets
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Targets processed per run before checkpointing and stopping (0 = unlimited)
    #[serde(rename = "max-pages", default)]
    pub max_pages: u32,

    #[serde(default)]
    pub extraction: ExtractionMode,

    /// Path patterns never crawled (segment prefixes, `*` wildcards allowed)
    #[serde(rename = "excluded-patterns", default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// File extensions treated as pages; extensionless paths are always allowed
    #[serde(rename = "allowed-extensions", default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

/// Longest backoff between two retries of one target
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// Seconds to a `Duration`, saturating instead of panicking on values that
/// validation would have rejected
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

impl CrawlerConfig {
    pub fn rate_limit_duration(&self) -> Duration {
        seconds(self.rate_limit)
    }

    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Backoff before retry number `attempt` (1-based): `retry_backoff * 2^(attempt-1)`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.saturating_sub(1).min(16) as i32);
        seconds(self.retry_backoff * factor).min(MAX_RETRY_DELAY)
    }

    pub fn rate_limit_backoff_duration(&self) -> Duration {
        seconds(self.rate_limit_backoff).min(self.max_server_delay_duration())
    }

    /// Cap applied to Retry-After and robots.txt Crawl-delay
    pub fn max_server_delay_duration(&self) -> Duration {
        seconds(self.max_server_delay)
    }
}

/// Which boilerplate removal strategy the extractor uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Tag exclusion plus class/role patterns and text-density pruning
    #[default]
    Density,
    /// Semantic tag exclusion only; fully deterministic
    TagExclusion,
}

/// User agent identification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt agent token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+url; email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one Markdown record per saved page
    #[serde(rename = "content-dir")]
    pub content_dir: PathBuf,

    /// Path of the JSON crawl checkpoint
    #[serde(rename = "state-path")]
    pub state_path: PathBuf,
}

fn default_max_depth() -> u32 {
    3
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> f64 {
    1.0
}

fn default_rate_limit_backoff() -> f64 {
    30.0
}

fn default_max_rate_limit_requeues() -> u32 {
    5
}

fn default_max_server_delay() -> f64 {
    300.0
}

fn default_max_redirects() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_interval() -> u32 {
    1
}

fn default_excluded_patterns() -> Vec<String> {
    [
        "/login", "/logout", "/signin", "/signout", "/admin", "/wp-admin", "/cart", "/checkout",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_allowed_extensions() -> Vec<String> {
    ["html", "htm", "php", "asp", "aspx"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}
