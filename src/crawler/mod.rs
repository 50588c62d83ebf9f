//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirects and error classification
//! - Link discovery in extracted content
//! - Per-host rate limiting
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod rate_limiter;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_http_client, FetchedPage, Fetcher};
pub use parser::{discover_links, DiscoveredLinks};
pub use rate_limiter::RateLimiter;
