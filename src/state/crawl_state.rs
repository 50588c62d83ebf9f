use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// Canonical URL
    pub url: String,

    /// Link distance from the seed (seed is 0)
    pub depth: u32,

    /// Page the link was found on; None for the seed
    pub discovered_from: Option<String>,
}

impl CrawlTarget {
    pub fn seed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            depth: 0,
            discovered_from: None,
        }
    }

    /// A target discovered on `parent`, one level deeper
    pub fn child(url: &str, parent: &CrawlTarget) -> Self {
        Self {
            url: url.to_string(),
            depth: parent.depth + 1,
            discovered_from: Some(parent.url.clone()),
        }
    }
}

/// Everything needed to resume a crawl
///
/// Canonical URL strings are the only keys: the frontier, the visited set
/// and the fingerprint map never hold two spellings of one resource. The
/// queued index mirrors the frontier and is rebuilt after loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Canonical URLs processed in the current pass
    pub visited: BTreeSet<String>,

    /// Pending targets, first in first out
    pub frontier: VecDeque<CrawlTarget>,

    /// Canonical URL to content hash of the last saved version
    pub fingerprints: BTreeMap<String, String>,

    #[serde(skip)]
    queued: HashSet<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the frontier index
    ///
    /// # Returns
    ///
    /// The first URL found twice in the frontier, if any
    pub fn rebuild_index(&mut self) -> Option<String> {
        self.queued.clear();
        for target in &self.frontier {
            if !self.queued.insert(target.url.clone()) {
                return Some(target.url.clone());
            }
        }
        None
    }

    /// Adds a target unless it was already visited or is already queued
    ///
    /// # Returns
    ///
    /// true if the target was added
    pub fn enqueue(&mut self, target: CrawlTarget) -> bool {
        if self.visited.contains(&target.url) || self.queued.contains(&target.url) {
            return false;
        }
        self.queued.insert(target.url.clone());
        self.frontier.push_back(target);
        true
    }

    /// Puts a popped target back at the end of the frontier (429 handling)
    pub fn requeue(&mut self, target: CrawlTarget) {
        if self.queued.insert(target.url.clone()) {
            self.frontier.push_back(target);
        }
    }

    /// Takes the next target off the frontier
    pub fn pop(&mut self) -> Option<CrawlTarget> {
        let target = self.frontier.pop_front()?;
        self.queued.remove(&target.url);
        Some(target)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_queued(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    /// Marks a URL as processed; the visited set only grows within a pass
    pub fn mark_visited(&mut self, url: &str) {
        self.visited.insert(url.to_string());
    }

    /// Stored content hash for `url`, if it was saved before
    pub fn fingerprint(&self, url: &str) -> Option<&str> {
        self.fingerprints.get(url).map(String::as_str)
    }

    /// Records the hash of a saved page, marking it visited
    pub fn record_fingerprint(&mut self, url: &str, hash: &str) {
        self.mark_visited(url);
        self.fingerprints.insert(url.to_string(), hash.to_string());
    }

    /// A pass is finished once something was visited and nothing is pending
    pub fn is_drained(&self) -> bool {
        self.frontier.is_empty() && !self.visited.is_empty()
    }

    /// Starts a new pass from `seed`, keeping fingerprints for change detection
    pub fn begin_pass(&mut self, seed: CrawlTarget) {
        self.visited.clear();
        self.frontier.clear();
        self.queued.clear();
        self.enqueue(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> CrawlTarget {
        CrawlTarget::seed(url)
    }

    #[test]
    fn test_enqueue_deduplicates() {
        let mut state = CrawlState::new();
        assert!(state.enqueue(target("https://example.org/a")));
        assert!(!state.enqueue(target("https://example.org/a")));
        assert_eq!(state.frontier.len(), 1);
    }

    #[test]
    fn test_enqueue_skips_visited() {
        let mut state = CrawlState::new();
        state.mark_visited("https://example.org/a");
        assert!(!state.enqueue(target("https://example.org/a")));
        assert!(state.frontier.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut state = CrawlState::new();
        state.enqueue(target("https://example.org/1"));
        state.enqueue(target("https://example.org/2"));
        state.enqueue(target("https://example.org/3"));

        let order: Vec<_> = std::iter::from_fn(|| state.pop()).map(|t| t.url).collect();
        assert_eq!(
            order,
            vec![
                "https://example.org/1",
                "https://example.org/2",
                "https://example.org/3"
            ]
        );
    }

    #[test]
    fn test_pop_allows_requeue() {
        let mut state = CrawlState::new();
        state.enqueue(target("https://example.org/a"));
        state.enqueue(target("https://example.org/b"));

        let first = state.pop().unwrap();
        assert!(!state.is_queued(&first.url));
        state.requeue(first);

        let urls: Vec<_> = state.frontier.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.org/b", "https://example.org/a"]);
    }

    #[test]
    fn test_requeue_does_not_duplicate() {
        let mut state = CrawlState::new();
        state.enqueue(target("https://example.org/a"));
        state.requeue(target("https://example.org/a"));
        assert_eq!(state.frontier.len(), 1);
    }

    #[test]
    fn test_child_depth_and_parent() {
        let seed = CrawlTarget::seed("https://example.org/docs");
        let child = CrawlTarget::child("https://example.org/docs/install", &seed);
        assert_eq!(child.depth, 1);
        assert_eq!(child.discovered_from.as_deref(), Some("https://example.org/docs"));
    }

    #[test]
    fn test_record_fingerprint_marks_visited() {
        let mut state = CrawlState::new();
        state.record_fingerprint("https://example.org/a", "abc");
        assert!(state.is_visited("https://example.org/a"));
        assert_eq!(state.fingerprint("https://example.org/a"), Some("abc"));
    }

    #[test]
    fn test_begin_pass_keeps_fingerprints() {
        let mut state = CrawlState::new();
        state.record_fingerprint("https://example.org/a", "abc");
        assert!(state.is_drained());

        state.begin_pass(CrawlTarget::seed("https://example.org/"));
        assert!(state.visited.is_empty());
        assert_eq!(state.frontier.len(), 1);
        assert_eq!(state.fingerprint("https://example.org/a"), Some("abc"));
        assert!(!state.is_drained());
    }

    #[test]
    fn test_rebuild_index_detects_duplicates() {
        let mut state = CrawlState::new();
        state.frontier.push_back(target("https://example.org/a"));
        state.frontier.push_back(target("https://example.org/a"));
        assert_eq!(
            state.rebuild_index(),
            Some("https://example.org/a".to_string())
        );
    }

    #[test]
    fn test_json_round_trip() {
        let mut state = CrawlState::new();
        let seed = CrawlTarget::seed("https://example.org/");
        state.enqueue(CrawlTarget::child("https://example.org/b", &seed));
        state.record_fingerprint("https://example.org/", "hash");

        let json = serde_json::to_string(&state).unwrap();
        let mut restored: CrawlState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.rebuild_index(), None);
        assert_eq!(restored, state);
        assert!(restored.is_queued("https://example.org/b"));
    }
}
