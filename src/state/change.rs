//! Content fingerprints and change detection
//!
//! The fingerprint covers the Markdown body only. Title and headings live
//! in the record's front matter and never influence it, so a page whose
//! metadata changed but whose body did not is not rewritten.

use sha2::{Digest, Sha256};

use crate::state::CrawlState;

/// SHA-256 hex digest of a Markdown body
///
/// Line endings are unified and trailing whitespace ignored before hashing,
/// so cosmetic differences do not count as changes.
pub fn fingerprint(markdown: &str) -> String {
    let mut hasher = Sha256::new();
    for line in markdown.trim_end().lines() {
        hasher.update(line.trim_end().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// True if `url` has never been saved or was saved with a different hash
pub fn has_changed(url: &str, new_hash: &str, state: &CrawlState) -> bool {
    state.fingerprint(url) != Some(new_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{to_markdown, ContentExtractor};
    use url::Url;

    const URL: &str = "https://example.org/docs";

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let hash = fingerprint("# Title\n\nBody\n");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_ignores_line_ending_noise() {
        assert_eq!(fingerprint("a\nb\n"), fingerprint("a\r\nb  \n\n"));
        assert_ne!(fingerprint("a\nb\n"), fingerprint("a\nc\n"));
    }

    #[test]
    fn test_new_url_has_changed() {
        let state = CrawlState::new();
        assert!(has_changed(URL, &fingerprint("body"), &state));
    }

    #[test]
    fn test_unmodified_page_has_not_changed() {
        let mut state = CrawlState::new();
        let hash = fingerprint("# Docs\n\nSame body.\n");
        state.record_fingerprint(URL, &hash);
        assert!(!has_changed(URL, &fingerprint("# Docs\n\nSame body.\n"), &state));
    }

    #[test]
    fn test_body_edit_has_changed() {
        let mut state = CrawlState::new();
        state.record_fingerprint(URL, &fingerprint("# Docs\n\nOld body.\n"));
        assert!(has_changed(URL, &fingerprint("# Docs\n\nNew body.\n"), &state));
    }

    #[test]
    fn test_metadata_only_change_is_not_a_change() {
        // Same main content, different <title> casing: the title ends up in
        // front matter only, so the body hash must not move.
        let page = |title: &str| {
            format!(
                "<html><head><title>{}</title></head><body><main><h2>Usage</h2><p>Run the tool with a config file and watch the output directory fill up.</p></main></body></html>",
                title
            )
        };
        let url = Url::parse(URL).unwrap();
        let extractor = ContentExtractor::default();

        let before = extractor.extract(&page("Usage Guide"), &url).unwrap();
        let after = extractor.extract(&page("USAGE GUIDE"), &url).unwrap();
        assert_ne!(before.title, after.title);

        let mut state = CrawlState::new();
        state.record_fingerprint(URL, &fingerprint(&to_markdown(&before.main_html, &url)));

        let new_hash = fingerprint(&to_markdown(&after.main_html, &url));
        assert!(!has_changed(URL, &new_hash, &state));
    }
}
