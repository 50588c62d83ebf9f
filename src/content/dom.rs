//! Small helpers over scraper's tree
//!
//! scraper exposes its `ego_tree` as `Html::tree`; removing a node means
//! collecting ids under an immutable borrow and detaching them afterwards.

use scraper::{ElementRef, Html, Selector};

/// Tags removed from every document before any strategy runs
pub const ALWAYS_REMOVE: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "frame", "object", "embed", "applet",
    "svg", "canvas", "audio", "video", "source", "track", "map", "area", "form", "input",
    "button", "select", "textarea",
];

/// Semantic page chrome
pub const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer", "aside", "menu", "menuitem"];

/// Compiles a selector, returning None for invalid CSS
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Detaches every element for which `predicate` holds
///
/// # Returns
///
/// Number of elements detached (nested matches are counted separately)
pub fn detach_where<F>(document: &mut Html, predicate: F) -> usize
where
    F: Fn(ElementRef) -> bool,
{
    let ids: Vec<_> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| predicate(*el))
        .map(|el| el.id())
        .collect();

    let count = ids.len();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    count
}

/// Detaches all elements with one of the given tag names
pub fn detach_tags(document: &mut Html, tags: &[&str]) -> usize {
    detach_where(document, |el| tags.contains(&el.value().name()))
}

/// Detaches comment nodes
pub fn detach_comments(document: &mut Html) {
    let ids: Vec<_> = document
        .root_element()
        .descendants()
        .filter(|node| node.value().is_comment())
        .map(|node| node.id())
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Element text with whitespace runs collapsed to single spaces
pub fn normalized_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Length in characters of the element's normalized text
pub fn text_len(element: ElementRef) -> usize {
    element
        .text()
        .flat_map(str::split_whitespace)
        .map(|word| word.chars().count() + 1)
        .sum::<usize>()
        .saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detach_tags() {
        let mut document = Html::parse_document(
            "<html><body><p>keep</p><script>drop()</script><nav>menu</nav></body></html>",
        );
        assert_eq!(detach_tags(&mut document, &["script", "nav"]), 2);
        let html = document.root_element().html();
        assert!(html.contains("keep"));
        assert!(!html.contains("drop()"));
        assert!(!html.contains("menu"));
    }

    #[test]
    fn test_detach_comments() {
        let mut document =
            Html::parse_document("<html><body><!-- tracking --><p>text</p></body></html>");
        detach_comments(&mut document);
        assert!(!document.root_element().html().contains("tracking"));
    }

    #[test]
    fn test_normalized_text() {
        let document = Html::parse_fragment("<div>  Hello \n\n <b>big</b>   world </div>");
        let div = document.select(&selector("div").unwrap()).next().unwrap();
        assert_eq!(normalized_text(div), "Hello big world");
        assert_eq!(text_len(div), "Hello big world".len());
    }
}
