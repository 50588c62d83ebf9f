//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: frontier, visited set and content fingerprints; the unit that is checkpointed
//! - `TargetState`: lifecycle of a single target (queued, fetching, ..., saved)
//! - `HostRateState`: per-host pacing used by the rate limiter
//! - `fingerprint` / `has_changed`: change detection over Markdown bodies

mod change;
mod crawl_state;
mod host_state;
mod target_state;

pub use change::{fingerprint, has_changed};
pub use crawl_state::{CrawlState, CrawlTarget};
pub use host_state::HostRateState;
pub use target_state::TargetState;
