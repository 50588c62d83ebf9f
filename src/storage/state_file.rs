//! JSON checkpoint file

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::state::CrawlState;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use crate::storage::write_atomic;

/// Checkpoint stored as a single JSON document
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, message: impl Into<String>) -> StorageError {
        StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> StorageResult<CrawlState> {
        if !self.path.exists() {
            debug!("No checkpoint at {}, starting fresh", self.path.display());
            return Ok(CrawlState::new());
        }

        let raw = fs::read_to_string(&self.path)?;
        let mut state: CrawlState =
            serde_json::from_str(&raw).map_err(|e| self.corrupt(e.to_string()))?;

        if let Some(duplicate) = state.rebuild_index() {
            return Err(self.corrupt(format!("frontier lists {} more than once", duplicate)));
        }

        debug!(
            "Loaded checkpoint: {} visited, {} queued, {} fingerprints",
            state.visited.len(),
            state.frontier.len(),
            state.fingerprints.len()
        );
        Ok(state)
    }

    fn checkpoint(&self, state: &CrawlState) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json)
    }

    fn is_fresh_run(&self) -> bool {
        !self.path.exists()
    }

    fn discard(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CrawlTarget;
    use tempfile::TempDir;

    fn store() -> (JsonStateStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonStateStore::new(dir.path().join("state").join("state.json"));
        (store, dir)
    }

    fn sample_state() -> CrawlState {
        let mut state = CrawlState::new();
        let seed = CrawlTarget::seed("https://example.org/docs");
        state.record_fingerprint(&seed.url, "aaaa");
        state.enqueue(CrawlTarget::child("https://example.org/docs/a", &seed));
        state.enqueue(CrawlTarget::child("https://example.org/docs/b", &seed));
        state
    }

    #[test]
    fn test_missing_file_is_fresh() {
        let (store, _dir) = store();
        assert!(store.is_fresh_run());
        assert_eq!(store.load().unwrap(), CrawlState::new());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let (store, _dir) = store();
        let state = sample_state();

        store.checkpoint(&state).unwrap();
        assert!(!store.is_fresh_run());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_queued("https://example.org/docs/a"));
    }

    #[test]
    fn test_checkpoint_leaves_no_temp_file() {
        let (store, _dir) = store();
        store.checkpoint(&sample_state()).unwrap();

        let parent = store.path().parent().unwrap();
        let names: Vec<_> = fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["state.json".to_string()]);
    }

    #[test]
    fn test_json_layout() {
        let (store, _dir) = store();
        store.checkpoint(&sample_state()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(value["visited"].is_array());
        assert_eq!(value["frontier"][0]["depth"], 1);
        assert_eq!(
            value["frontier"][0]["discovered_from"],
            "https://example.org/docs"
        );
        assert_eq!(value["fingerprints"]["https://example.org/docs"], "aaaa");
    }

    #[test]
    fn test_unreadable_file_is_corrupt() {
        let (store, _dir) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_duplicate_frontier_is_corrupt() {
        let (store, _dir) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{
                "visited": [],
                "frontier": [
                    {"url": "https://example.org/a", "depth": 1, "discovered_from": null},
                    {"url": "https://example.org/a", "depth": 1, "discovered_from": null}
                ],
                "fingerprints": {}
            }"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_discard() {
        let (store, _dir) = store();
        store.checkpoint(&sample_state()).unwrap();
        store.discard().unwrap();
        assert!(store.is_fresh_run());
        // discarding twice is fine
        store.discard().unwrap();
    }
}
