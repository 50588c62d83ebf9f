//! Main content extraction
//!
//! Turns a fetched HTML page into its title, its headings and the HTML of
//! its main content container. Link discovery and Markdown conversion both
//! work from that container, so navigation chrome never reaches the output.

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::config::ExtractionMode;
use crate::content::dom::{detach_comments, detach_tags, normalized_text, selector, ALWAYS_REMOVE};
use crate::content::strategy::{DensityStrategy, ExtractionStrategy, TagExclusionStrategy};
use crate::CrawlerError;

/// Tags stripped by the whole-body fallback
const FALLBACK_REMOVE: &[&str] = &["script", "style", "noscript", "template", "nav", "footer"];

/// Result of extracting one page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    /// Page title (from `<title>` minus the site suffix, else the first `<h1>`)
    pub title: String,

    /// Text of every heading in the main content, in document order
    pub headings: Vec<String>,

    /// Outer HTML of the main content container
    pub main_html: String,

    /// Whitespace-separated words in the main content
    pub word_count: usize,
}

/// Extracts main content with a pluggable boilerplate strategy
#[derive(Debug)]
pub struct ContentExtractor {
    strategy: Box<dyn ExtractionStrategy>,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(Box::new(DensityStrategy::new()))
    }
}

impl ContentExtractor {
    pub fn new(strategy: Box<dyn ExtractionStrategy>) -> Self {
        Self { strategy }
    }

    /// Builds the extractor selected in the configuration
    pub fn for_mode(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Density => Self::new(Box::new(DensityStrategy::new())),
            ExtractionMode::TagExclusion => Self::new(Box::new(TagExclusionStrategy)),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Extracts title, headings and main content from an HTML page
    ///
    /// Degrades instead of failing: when the strategy finds no container the
    /// whole body is used with only scripts, styles, navigation and footers
    /// removed, and when even that is empty the navigation is kept too.
    ///
    /// # Errors
    ///
    /// `CrawlerError::Extraction` when the input is empty, binary, or has no
    /// text at all.
    pub fn extract(&self, html: &str, url: &Url) -> Result<ExtractedContent, CrawlerError> {
        if html.trim().is_empty() {
            return Err(extraction_error(url, "empty document"));
        }
        if html.contains('\0') {
            return Err(extraction_error(url, "binary content"));
        }

        let mut document = Html::parse_document(html);
        let title = extract_title(&document);

        detach_tags(&mut document, ALWAYS_REMOVE);
        detach_comments(&mut document);

        let main_html = match self.strategy.isolate(&mut document) {
            Some(main_html) => main_html,
            None => {
                debug!(
                    "{} strategy found no main content in {}, using body",
                    self.strategy.name(),
                    url
                );
                fallback_body(html, FALLBACK_REMOVE)
                    .or_else(|| fallback_body(html, &["script", "style", "noscript", "template"]))
                    .ok_or_else(|| extraction_error(url, "no text content"))?
            }
        };

        let fragment = Html::parse_fragment(&main_html);
        let headings = extract_headings(&fragment);
        let word_count = fragment
            .root_element()
            .text()
            .flat_map(str::split_whitespace)
            .count();

        Ok(ExtractedContent {
            title,
            headings,
            main_html,
            word_count,
        })
    }
}

fn extraction_error(url: &Url, message: &str) -> CrawlerError {
    CrawlerError::Extraction {
        url: url.to_string(),
        message: message.to_string(),
    }
}

/// Body HTML with `remove` tags stripped, if any text remains
fn fallback_body(html: &str, remove: &[&str]) -> Option<String> {
    let mut document = Html::parse_document(html);
    detach_tags(&mut document, remove);
    detach_comments(&mut document);

    let body_selector = selector("body")?;
    let body = document.select(&body_selector).next()?;
    if normalized_text(body).is_empty() {
        return None;
    }
    Some(body.html())
}

/// Extracts the page title
///
/// `<title>` text minus a trailing site name after " | " or " - ", then the
/// first `<h1>`, then "Untitled".
fn extract_title(document: &Html) -> String {
    let from_title = selector("title")
        .and_then(|sel| document.select(&sel).next())
        .map(normalized_text)
        .map(|title| strip_site_suffix(&title))
        .filter(|title| !title.is_empty());

    from_title
        .or_else(|| {
            selector("h1")
                .and_then(|sel| document.select(&sel).next())
                .map(normalized_text)
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

fn strip_site_suffix(title: &str) -> String {
    for separator in [" | ", " - ", " \u{2013} ", " \u{2014} "] {
        if let Some((head, _)) = title.split_once(separator) {
            let head = head.trim();
            if !head.is_empty() {
                return head.to_string();
            }
        }
    }
    title.trim().to_string()
}

fn extract_headings(fragment: &Html) -> Vec<String> {
    let Some(sel) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };
    fragment
        .select(&sel)
        .map(normalized_text)
        .filter(|text| !text.is_empty())
        .collect()
}
