//! URL handling module for rag-crawler
//!
//! This module canonicalizes discovered links and decides which of them
//! belong to the crawl: same host as the seed, http(s) only, not excluded,
//! and not pointing at a non-page file.

mod domain;
mod matcher;
mod normalize;

use crate::config::CrawlerConfig;
use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{host_key, robots_url};
pub use matcher::matches_path_pattern;
pub use normalize::canonicalize;

/// Why a discovered link was not accepted into the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRejection {
    /// Could not be parsed or resolved against its base
    Malformed,
    /// Not http or https (mailto:, javascript:, ftp:, ...)
    UnsupportedScheme,
    /// Points at a different host than the seed
    CrossDomain,
    /// Path matches a configured exclusion pattern
    Excluded,
    /// Path ends in a file extension that is not a page
    Extension,
}

/// Canonicalizes links and filters them to the crawl's domain
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    domain: String,
    /// Scheme of the seed; discovered links are rewritten to it
    scheme: String,
    excluded_patterns: Vec<String>,
    allowed_extensions: Vec<String>,
}

impl UrlNormalizer {
    /// Creates a normalizer scoped to the host of `seed`
    pub fn new(
        seed: &Url,
        excluded_patterns: Vec<String>,
        allowed_extensions: Vec<String>,
    ) -> UrlResult<Self> {
        let domain = host_key(seed).ok_or(UrlError::MissingHost)?;
        Ok(Self {
            domain,
            scheme: seed.scheme().to_string(),
            excluded_patterns,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        })
    }

    /// Builds a normalizer from the crawler section of the configuration
    pub fn from_config(config: &CrawlerConfig) -> UrlResult<Self> {
        let seed = Url::parse(&config.seed_url).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::new(
            &seed,
            config.excluded_patterns.clone(),
            config.allowed_extensions.clone(),
        )
    }

    /// The host key every accepted URL must share
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resolves `raw` against `base` and returns its canonical form, or
    /// `None` when the link is not part of the crawl
    pub fn normalize(&self, raw: &str, base: &Url) -> Option<String> {
        self.classify(raw, base).ok()
    }

    /// Like [`normalize`](Self::normalize), but reports why a link was rejected
    ///
    /// An `http` link on an `https` site (or the reverse) is rewritten to the
    /// seed's scheme, so both spellings of one page share a canonical URL.
    pub fn classify(&self, raw: &str, base: &Url) -> Result<String, LinkRejection> {
        self.accept(raw, base, true)
    }

    /// Checks a redirect `Location`; unlike [`classify`](Self::classify) it
    /// keeps the scheme, so an `http` seed may move to `https`
    pub fn classify_redirect(&self, raw: &str, base: &Url) -> Result<String, LinkRejection> {
        self.accept(raw, base, false)
    }

    fn accept(&self, raw: &str, base: &Url, pin_scheme: bool) -> Result<String, LinkRejection> {
        let resolved = base
            .join(raw.trim())
            .map_err(|_| LinkRejection::Malformed)?;

        let mut url = match canonicalize(&resolved) {
            Ok(url) => url,
            Err(UrlError::InvalidScheme(_)) => return Err(LinkRejection::UnsupportedScheme),
            Err(_) => return Err(LinkRejection::Malformed),
        };

        if host_key(&url).as_deref() != Some(self.domain.as_str()) {
            return Err(LinkRejection::CrossDomain);
        }

        if pin_scheme && url.scheme() != self.scheme && url.set_scheme(&self.scheme).is_err() {
            return Err(LinkRejection::UnsupportedScheme);
        }

        let path = url.path();
        if self
            .excluded_patterns
            .iter()
            .any(|pattern| matches_path_pattern(pattern, path))
        {
            return Err(LinkRejection::Excluded);
        }

        if let Some(extension) = file_extension(path) {
            if !self.allowed_extensions.iter().any(|e| *e == extension) {
                return Err(LinkRejection::Extension);
            }
        }

        Ok(url.to_string())
    }
}

/// Extension of the last path segment, if it looks like a file extension
///
/// Version-like segments such as `v1.2` have no extension.
fn file_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, extension) = last.rsplit_once('.')?;
    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > 5
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
        || !extension.chars().any(|c| c.is_ascii_alphabetic())
    {
        return None;
    }
    Some(extension.to_lowercase())
}
