//! Link discovery
//!
//! Links are taken from the extracted main content only, so navigation and
//! footer boilerplate does not drive the traversal.
//!
//! **Include:** `<a href="...">`, `rel="nofollow"` included
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` and `data:` links
//! - Fragment-only links (same page anchors)
//! - Anything the [`UrlNormalizer`] rejects (other hosts, excluded paths,
//!   non-page extensions)

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use crate::url::{LinkRejection, UrlNormalizer};

/// Links found on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    /// Canonical, deduplicated, in document order
    pub links: Vec<String>,

    /// Absolute URLs on other hosts; discovered but never crawled
    pub cross_domain: Vec<String>,

    /// Links dropped for any other reason
    pub rejected: usize,
}

/// Collects crawlable links from `main_html`
///
/// # Arguments
///
/// * `main_html` - Main content fragment from the extractor
/// * `base_url` - Final URL of the page, for resolving relative links
/// * `normalizer` - Canonicalizes links and applies the crawl's filters
pub fn discover_links(
    main_html: &str,
    base_url: &Url,
    normalizer: &UrlNormalizer,
) -> DiscoveredLinks {
    let mut discovered = DiscoveredLinks::default();
    let Ok(anchors) = Selector::parse("a[href]") else {
        return discovered;
    };

    let fragment = Html::parse_fragment(main_html);
    let mut seen = HashSet::new();

    for element in fragment.select(&anchors) {
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_skipped_href(href) {
            continue;
        }

        match normalizer.classify(href, base_url) {
            Ok(canonical) => {
                if seen.insert(canonical.clone()) {
                    discovered.links.push(canonical);
                }
            }
            Err(LinkRejection::CrossDomain) => {
                if let Ok(absolute) = base_url.join(href.trim()) {
                    discovered.cross_domain.push(absolute.to_string());
                }
            }
            Err(_) => discovered.rejected += 1,
        }
    }

    discovered
}

fn is_skipped_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }
    let lower = href.to_ascii_lowercase();
    ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/docs/page").unwrap()
    }

    fn normalizer() -> UrlNormalizer {
        UrlNormalizer::new(
            &base_url(),
            vec!["/admin".to_string()],
            vec!["html".to_string()],
        )
        .unwrap()
    }

    fn links(html: &str) -> DiscoveredLinks {
        discover_links(html, &base_url(), &normalizer())
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let found = links(
            r#"<a href="/other">One</a><a href="install">Two</a><a href="https://example.com/abs">Three</a>"#,
        );
        assert_eq!(
            found.links,
            vec![
                "https://example.com/other",
                "https://example.com/docs/install",
                "https://example.com/abs"
            ]
        );
    }

    #[test]
    fn test_cross_domain_is_reported_not_followed() {
        let found = links(r#"<a href="/docs/install">In</a><a href="https://other.org/x">Out</a>"#);
        assert_eq!(found.links, vec!["https://example.com/docs/install"]);
        assert_eq!(found.cross_domain, vec!["https://other.org/x"]);
    }

    #[test]
    fn test_duplicates_collapse_to_canonical() {
        let found = links(
            r#"<a href="/a/">1</a><a href="/a#top">2</a><a href="https://EXAMPLE.com/a?utm_source=x">3</a>"#,
        );
        assert_eq!(found.links, vec!["https://example.com/a"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let found = links(
            r#"<a href="javascript:void(0)">j</a><a href="mailto:a@example.com">m</a><a href="tel:+1">t</a><a href="data:text/html,x">d</a>"#,
        );
        assert!(found.links.is_empty());
        assert_eq!(found.rejected, 0);
    }

    #[test]
    fn test_skip_download_and_fragment() {
        let found = links(r##"<a href="/file" download>f</a><a href="#section">s</a>"##);
        assert!(found.links.is_empty());
    }

    #[test]
    fn test_follow_nofollow_links() {
        let found = links(r#"<a href="/page2" rel="nofollow">Link</a>"#);
        assert_eq!(found.links, vec!["https://example.com/page2"]);
    }

    #[test]
    fn test_filtered_links_are_counted() {
        let found = links(r#"<a href="/admin/users">a</a><a href="/report.pdf">p</a><a href="/guide.html">g</a>"#);
        assert_eq!(found.links, vec!["https://example.com/guide.html"]);
        assert_eq!(found.rejected, 2);
    }
}
