//! Boilerplate removal strategies
//!
//! A strategy receives a document that already had scripts, styles, forms
//! and comments removed. It detaches whatever it considers page chrome and
//! returns the outer HTML of the main content container.

use std::fmt::Debug;

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::trace;

use crate::content::dom::{
    detach_tags, detach_where, normalized_text, selector, text_len, BOILERPLATE_TAGS,
};

/// Minimum text a main-container candidate must carry
const MIN_MAIN_TEXT: usize = 50;

/// Candidate selectors for the main content container, in priority order
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=main]",
    "div.entry-content",
    "div.post-content",
    "div.page-content",
    "div.article-content",
    "div.content-area",
    "div#main",
    "div#content",
    "div#article",
    "div#primary",
    "section.content",
];

/// Class or id tokens marking page chrome. Tokens are matched whole, with an
/// optional `site-`/`page-` style prefix and any `-suffix`.
const BOILERPLATE_TOKEN_PATTERN: &str = r"^(?:site|page|main|global|top|primary)?-?(?:nav|navigation|navbar|menu|header|footer|sidebar|widget|comments?|share|sharing|social|advert|advertisement|ads?|banner|popup|modal|overlay|cookie|consent|newsletter|subscribe|related-posts?|breadcrumbs?|pagination|author-bio|meta-info)(?:-.*)?$";

/// ARIA landmark roles that never hold main content
const BOILERPLATE_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary", "search"];

/// Block elements eligible for class/id matching and density pruning
const PRUNABLE_BLOCKS: &[&str] = &["div", "section", "aside", "ul", "ol", "dl", "figure"];

/// Chooses and isolates the main content of a page
pub trait ExtractionStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Detaches boilerplate from `document` and returns the outer HTML of the
    /// main container, or None when no container holds any text
    fn isolate(&self, document: &mut Html) -> Option<String>;
}

/// Semantic tag exclusion only
///
/// Removes `nav`, `header`, `footer`, `aside` and `menu`, then takes the first
/// `main`, `article` or `[role=main]` element with text, else the body. The
/// result depends only on tag names, never on text statistics.
#[derive(Debug, Default, Clone)]
pub struct TagExclusionStrategy;

impl ExtractionStrategy for TagExclusionStrategy {
    fn name(&self) -> &'static str {
        "tag-exclusion"
    }

    fn isolate(&self, document: &mut Html) -> Option<String> {
        detach_tags(document, BOILERPLATE_TAGS);

        for css in ["main", "article", "[role=main]", "body"] {
            let Some(sel) = selector(css) else {
                continue;
            };
            if let Some(container) = document.select(&sel).find(|el| text_len(*el) > 0) {
                return Some(container.html());
            }
        }
        None
    }
}

/// Tag exclusion plus class/role patterns and text-density pruning
///
/// Inside the chosen container, a block is dropped when its markup is at
/// least `min_markup` bytes, its text-to-markup ratio is below `threshold`,
/// and it contains no prose (paragraphs, headings, code, quotes, tables).
#[derive(Debug, Clone)]
pub struct DensityStrategy {
    threshold: f64,
    min_markup: usize,
    boilerplate: Option<Regex>,
}

impl Default for DensityStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl DensityStrategy {
    pub fn new() -> Self {
        Self {
            threshold: 0.1,
            min_markup: 200,
            boilerplate: Regex::new(BOILERPLATE_TOKEN_PATTERN).ok(),
        }
    }

    /// Overrides the text-to-markup ratio below which a block is boilerplate
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn is_boilerplate_block(&self, element: ElementRef) -> bool {
        let value = element.value();

        if let Some(role) = value.attr("role") {
            if BOILERPLATE_ROLES.contains(&role.trim().to_lowercase().as_str()) {
                return true;
            }
        }

        if !PRUNABLE_BLOCKS.contains(&value.name()) {
            return false;
        }

        let Some(pattern) = &self.boilerplate else {
            return false;
        };

        value
            .classes()
            .chain(value.id())
            .map(|token| token.to_lowercase().replace('_', "-"))
            .any(|token| pattern.is_match(&token))
    }

    fn is_low_density(&self, element: ElementRef) -> bool {
        if !PRUNABLE_BLOCKS.contains(&element.value().name()) {
            return false;
        }

        let markup = element.html().len();
        if markup < self.min_markup {
            return false;
        }

        let ratio = text_len(element) as f64 / markup as f64;
        ratio < self.threshold && !has_prose(element)
    }

    fn select_main<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for css in MAIN_SELECTORS {
            let Some(sel) = selector(css) else {
                continue;
            };
            if let Some(candidate) = document
                .select(&sel)
                .find(|el| text_len(*el) > MIN_MAIN_TEXT)
            {
                trace!("Main container matched '{}'", css);
                return Some(candidate);
            }
        }

        // Largest-text div, then the body
        let largest = selector("div").and_then(|sel| {
            document
                .select(&sel)
                .map(|el| (text_len(el), el))
                .filter(|(len, _)| *len > MIN_MAIN_TEXT)
                .max_by_key(|(len, _)| *len)
                .map(|(_, el)| el)
        });

        largest.or_else(|| {
            selector("body").and_then(|sel| document.select(&sel).find(|el| text_len(*el) > 0))
        })
    }
}

impl ExtractionStrategy for DensityStrategy {
    fn name(&self) -> &'static str {
        "density"
    }

    fn isolate(&self, document: &mut Html) -> Option<String> {
        detach_tags(document, BOILERPLATE_TAGS);
        let removed = detach_where(document, |el| {
            !matches!(el.value().name(), "html" | "body" | "main" | "article")
                && self.is_boilerplate_block(el)
        });
        trace!("Removed {} class/role boilerplate blocks", removed);

        let main_id = self.select_main(document)?.id();

        let sparse: Vec<_> = document
            .tree
            .get(main_id)
            .and_then(ElementRef::wrap)
            .map(|main| {
                main.descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .filter(|el| self.is_low_density(*el))
                    .map(|el| el.id())
                    .collect()
            })
            .unwrap_or_default();

        trace!("Pruning {} low-density blocks", sparse.len());
        for id in sparse {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let main = document.tree.get(main_id).and_then(ElementRef::wrap)?;
        if normalized_text(main).is_empty() {
            return None;
        }
        Some(main.html())
    }
}

/// Whether the element contains prose that must survive density pruning
fn has_prose(element: ElementRef) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| {
            matches!(
                el.value().name(),
                "p" | "pre" | "blockquote" | "table" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            )
        })
}
