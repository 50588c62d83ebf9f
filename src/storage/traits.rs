//! Storage traits and error types
//!
//! Two stores back a crawl: the state store holds the resumable checkpoint,
//! the content store holds the Markdown records handed to ingestion.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::CrawlState;
use crate::storage::PageRecord;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A persisted file exists but cannot be trusted
    #[error("Corrupt file {path}: {message}")]
    Corrupt { path: String, message: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(e: serde_yaml::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for the crawl checkpoint
pub trait StateStore {
    /// Loads the last checkpoint
    ///
    /// A missing checkpoint yields an empty state; an unreadable one is
    /// `StorageError::Corrupt` and never silently replaced.
    fn load(&self) -> StorageResult<CrawlState>;

    /// Atomically replaces the checkpoint with `state`
    fn checkpoint(&self, state: &CrawlState) -> StorageResult<()>;

    /// True when no checkpoint exists yet
    fn is_fresh_run(&self) -> bool;

    /// Deletes the checkpoint (operator-requested fresh start)
    fn discard(&self) -> StorageResult<()>;
}

/// Persistence for saved page records
pub trait ContentStore {
    /// Where the record for `url` lives
    fn path_for(&self, url: &str) -> PathBuf;

    /// Atomically writes `record`, replacing any previous version
    ///
    /// # Returns
    ///
    /// The path that was written
    fn save(&self, record: &PageRecord) -> StorageResult<PathBuf>;

    /// Reads back the record for `url`, if one was saved
    fn load(&self, url: &str) -> StorageResult<Option<PageRecord>>;
}
