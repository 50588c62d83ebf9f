//! Storage module for persisting crawl data
//!
//! This module handles everything the crawler writes to disk:
//! - The JSON checkpoint that makes a crawl resumable
//! - One front-matter Markdown record per saved page
//!
//! Both are written with [`write_atomic`], so a crash mid-write leaves the
//! previous version in place.

mod content;
mod state_file;
mod traits;

pub use content::{url_to_filename, MarkdownStore, PageRecord};
pub use state_file::JsonStateStore;
pub use traits::{ContentStore, StateStore, StorageError, StorageResult};

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes `bytes` to `path` through a synced `<path>.tmp` and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
