//! Lifecycle of a single crawl target
//!
//! `Queued -> Fetching -> Extracted -> Converted -> Saved | SkippedUnchanged`,
//! with `Failed` reachable from every non-terminal stage after `Queued`, and
//! `Fetching -> Queued` when a 429 sends the target back to the frontier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CrawlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    // ===== Active States =====
    /// Waiting in the frontier
    Queued,

    /// Request in flight (including retries)
    Fetching,

    /// Main content isolated
    Extracted,

    /// Markdown produced and fingerprinted
    Converted,

    // ===== Terminal States =====
    /// Content changed (or is new) and was written
    Saved,

    /// Fingerprint matched the stored one; nothing written
    SkippedUnchanged,

    /// Gave up on this target
    Failed,
}

impl TargetState {
    /// Returns true if no further processing happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved | Self::SkippedUnchanged | Self::Failed)
    }

    /// Returns true if the target produced usable content
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved | Self::SkippedUnchanged)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: TargetState) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (Queued, Fetching)
                | (Fetching, Extracted)
                | (Fetching, Queued)
                | (Fetching, Failed)
                | (Extracted, Converted)
                | (Extracted, Failed)
                | (Converted, Saved)
                | (Converted, SkippedUnchanged)
                | (Converted, Failed)
        )
    }

    /// Moves to `next`, rejecting illegal steps
    pub fn transition(self, next: TargetState) -> Result<TargetState, CrawlerError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CrawlerError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracted => "extracted",
            Self::Converted => "converted",
            Self::Saved => "saved",
            Self::SkippedUnchanged => "skipped_unchanged",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
