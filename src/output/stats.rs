//! Run statistics
//!
//! This module accumulates per-run counters and prints the end-of-run
//! summary, plus the checkpoint overview shown by `--status`.

use std::time::Duration;

use crate::state::CrawlState;

/// Counters for a single run; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Targets fetched successfully (HTML received)
    pub pages_crawled: u64,

    /// Records written because the content was new or changed
    pub pages_saved: u64,

    /// Fetched pages whose fingerprint matched the stored one
    pub pages_skipped_unchanged: u64,

    /// Targets that ended in the failed state
    pub errors: u64,

    /// Targets blocked by robots.txt
    pub pages_disallowed: u64,

    /// 429 requeues
    pub pages_requeued: u64,

    /// Words across saved records
    pub total_words: u64,

    pub duration: Duration,
}

impl CrawlStats {
    /// Targets that reached a terminal state this run
    pub fn pages_processed(&self) -> u64 {
        self.pages_saved + self.pages_skipped_unchanged + self.errors + self.pages_disallowed
    }

    /// Crawled pages per second over the whole run
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.pages_crawled as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints the run summary to stdout
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages crawled: {}", stats.pages_crawled);
    println!("  Pages saved: {}", stats.pages_saved);
    println!("  Unchanged (skipped): {}", stats.pages_skipped_unchanged);
    println!("  Errors: {}", stats.errors);
    println!();

    if stats.pages_disallowed > 0 || stats.pages_requeued > 0 {
        println!("Politeness:");
        println!("  Disallowed by robots.txt: {}", stats.pages_disallowed);
        println!("  Requeued after 429: {}", stats.pages_requeued);
        println!();
    }

    println!("Words saved: {}", stats.total_words);
    println!(
        "Duration: {:.1}s ({:.2} pages/sec)",
        stats.duration.as_secs_f64(),
        stats.pages_per_second()
    );
}

/// Overview of a stored checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSummary {
    pub visited: usize,
    pub frontier: usize,
    pub fingerprints: usize,
    /// Deepest pending target, if any
    pub max_frontier_depth: Option<u32>,
}

impl StateSummary {
    pub fn from_state(state: &CrawlState) -> Self {
        Self {
            visited: state.visited.len(),
            frontier: state.frontier.len(),
            fingerprints: state.fingerprints.len(),
            max_frontier_depth: state.frontier.iter().map(|t| t.depth).max(),
        }
    }
}

/// Prints a checkpoint overview to stdout
pub fn print_state_summary(summary: &StateSummary) {
    println!("=== Crawl State ===\n");
    println!("  Visited this pass: {}", summary.visited);
    println!("  Pending in frontier: {}", summary.frontier);
    if let Some(depth) = summary.max_frontier_depth {
        println!("  Deepest pending target: {}", depth);
    }
    println!("  Fingerprinted pages: {}", summary.fingerprints);
    if summary.frontier == 0 && summary.visited > 0 {
        println!("\nLast pass finished; the next run starts a new pass.");
    } else if summary.frontier > 0 {
        println!("\nThe next run resumes the pending frontier.");
    }
}
