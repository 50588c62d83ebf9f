//! Markdown records with YAML front matter
//!
//! Each saved page becomes one file in the content directory:
//!
//! ```text
//! ---
//! source_url: https://example.org/docs/install
//! title: Install
//! crawl_timestamp: 2024-05-01T12:00:00Z
//! content_hash: 3f2a...
//! word_count: 412
//! headings:
//! - Install
//! - Requirements
//! ---
//!
//! # Install
//! ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::storage::traits::{ContentStore, StorageError, StorageResult};
use crate::storage::write_atomic;

/// Longest slug kept before a hash suffix replaces the tail
const MAX_SLUG_LEN: usize = 100;

/// Hex characters of the URL hash appended to slugs that lost information
const SUFFIX_LEN: usize = 8;

const FRONT_MATTER_FENCE: &str = "---\n";

/// One saved page; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub source_url: String,
    pub title: String,
    /// ISO-8601 UTC
    pub crawl_timestamp: String,
    /// SHA-256 hex of the body
    pub content_hash: String,
    pub word_count: usize,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(skip)]
    pub body: String,
}

impl PageRecord {
    /// Builds a record stamped with the current time
    pub fn new(
        source_url: &str,
        title: &str,
        content_hash: &str,
        word_count: usize,
        headings: Vec<String>,
        body: String,
    ) -> Self {
        Self {
            source_url: source_url.to_string(),
            title: title.to_string(),
            crawl_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            content_hash: content_hash.to_string(),
            word_count,
            headings,
            body,
        }
    }

    /// Renders the file contents: front matter, blank line, body
    pub fn to_document(&self) -> StorageResult<String> {
        let front_matter = serde_yaml::to_string(self)?;
        let mut doc = String::with_capacity(front_matter.len() + self.body.len() + 16);
        doc.push_str(FRONT_MATTER_FENCE);
        doc.push_str(&front_matter);
        doc.push_str(FRONT_MATTER_FENCE);
        doc.push('\n');
        doc.push_str(self.body.trim_end());
        doc.push('\n');
        Ok(doc)
    }

    /// Parses a document produced by [`PageRecord::to_document`]
    pub fn from_document(doc: &str) -> Option<Self> {
        let rest = doc.strip_prefix(FRONT_MATTER_FENCE)?;
        let end = rest.find("\n---\n")?;
        let mut record: PageRecord = serde_yaml::from_str(&rest[..end + 1]).ok()?;
        let body = &rest[end + 5..];
        record.body = body.strip_prefix('\n').unwrap_or(body).to_string();
        Some(record)
    }
}

/// Turns a URL into a file stem: `host_path_segments`
///
/// The plain slug is used only when it maps back to exactly one path: every
/// segment is lowercase ASCII letters, digits or `-`. Anything else
/// (`/a_b` vs `/a/b`, `/x.html` vs `/x_html`, a query, case that a
/// case-insensitive filesystem would fold, an over-long slug) gets a short
/// hash of the full URL appended, so distinct URLs never share a file.
pub fn url_to_filename(url: &str) -> String {
    let (slug, needs_suffix) = match Url::parse(url) {
        Ok(parsed) => {
            let mut parts: Vec<String> = Vec::new();
            if let Some(host) = parsed.host_str() {
                parts.push(host.to_string());
            }
            if let Some(port) = parsed.port() {
                parts.push(port.to_string());
            }
            parts.extend(
                parsed
                    .path()
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
            let needs_suffix = parsed.query().is_some() || !is_lossless_path(parsed.path());
            (slugify(&parts.join("_")), needs_suffix)
        }
        Err(_) => (slugify(url), true),
    };

    if !needs_suffix && slug.len() <= MAX_SLUG_LEN && !slug.is_empty() {
        return slug;
    }

    let hash = hex::encode(Sha256::digest(url.as_bytes()));
    let keep = MAX_SLUG_LEN - SUFFIX_LEN - 1;
    let stem = slug[..slug.len().min(keep)].trim_end_matches('_');
    if stem.is_empty() {
        hash[..SUFFIX_LEN].to_string()
    } else {
        format!("{}_{}", stem, &hash[..SUFFIX_LEN])
    }
}

fn is_lossless_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    path.strip_prefix('/').is_some_and(|rest| {
        rest.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
    })
}

fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('_').to_string()
}

/// Front-matter Markdown files in one directory
#[derive(Debug, Clone)]
pub struct MarkdownStore {
    output_dir: PathBuf,
}

impl MarkdownStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ContentStore for MarkdownStore {
    fn path_for(&self, url: &str) -> PathBuf {
        self.output_dir.join(format!("{}.md", url_to_filename(url)))
    }

    fn save(&self, record: &PageRecord) -> StorageResult<PathBuf> {
        let path = self.path_for(&record.source_url);
        write_atomic(&path, record.to_document()?.as_bytes())?;
        Ok(path)
    }

    fn load(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let path = self.path_for(url);
        if !path.exists() {
            return Ok(None);
        }
        let doc = fs::read_to_string(&path)?;
        PageRecord::from_document(&doc)
            .map(Some)
            .ok_or_else(|| StorageError::Corrupt {
                path: path.display().to_string(),
                message: "missing or malformed front matter".to_string(),
            })
    }
}
