//! Output module for run reports
//!
//! This module handles:
//! - Accumulating per-run crawl statistics
//! - Printing the end-of-run summary
//! - Summarizing a stored checkpoint for `--status`

pub mod stats;

pub use stats::{print_state_summary, print_statistics, CrawlStats, StateSummary};
