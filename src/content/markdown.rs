//! HTML to Markdown conversion
//!
//! The converter walks the scraper tree and emits CommonMark with GFM pipe
//! tables. Output is normalized (single blank lines between blocks, no
//! trailing whitespace, one final newline) and stable: rendering it back to
//! HTML and converting again yields the same text. Stability comes from
//! escaping every character in text that CommonMark would treat as markup,
//! from placing emphasis delimiters only where they can open or close, and
//! from separating adjacent lists with alternate markers so a renderer never
//! merges them.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::content::dom::selector;

/// Placeholder for `<br>` while inline text is assembled
const BREAK: char = '\u{1}';

/// Emphasis placeholders, turned into `*`/`**` once the surrounding text is known
const EM_OPEN: char = '\u{2}';
const EM_CLOSE: char = '\u{3}';
const STRONG_OPEN: char = '\u{4}';
const STRONG_CLOSE: char = '\u{5}';

const EM_SEAM: &str = "\u{3}\u{2}";
const STRONG_SEAM: &str = "\u{5}\u{4}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    List { ordered: bool, alternate: bool },
    Other,
}

#[derive(Debug, Clone)]
struct Block {
    text: String,
    kind: BlockKind,
}

impl Block {
    fn other(text: String) -> Self {
        Self {
            text,
            kind: BlockKind::Other,
        }
    }
}

/// Converts extracted main-content HTML to normalized Markdown
///
/// Relative link targets are resolved against `page_url`. Images become
/// `*Image: alt*` placeholders, or disappear when they have no alt text.
///
/// # Example
///
/// ```
/// use rag_crawler::content::to_markdown;
/// use url::Url;
///
/// let url = Url::parse("https://example.org/docs/").unwrap();
/// let md = to_markdown("<h2>Setup</h2><p>See <a href=\"install\">install</a>.</p>", &url);
/// assert_eq!(md, "## Setup\n\nSee [install](https://example.org/docs/install).\n");
/// ```
pub fn to_markdown(main_html: &str, page_url: &Url) -> String {
    let fragment = Html::parse_fragment(main_html);
    let converter = Converter { base: page_url };
    let blocks = converter.blocks(fragment.root_element());
    normalize_whitespace(&join_blocks(&blocks))
}

struct Converter<'a> {
    base: &'a Url,
}

impl Converter<'_> {
    /// Renders the children of `parent` as a sequence of blocks; loose
    /// inline content between block elements becomes paragraphs
    fn blocks(&self, parent: ElementRef) -> Vec<Block> {
        let mut blocks = Vec::new();
        self.blocks_into(parent, &mut blocks);
        blocks
    }

    /// Like [`blocks`](Self::blocks), appending to `blocks` so that list
    /// adjacency is seen through transparent wrappers such as `div`
    fn blocks_into(&self, parent: ElementRef, blocks: &mut Vec<Block>) {
        let mut inline = String::new();

        for child in parent.children() {
            match child.value() {
                Node::Text(text) => push_text(&mut inline, text),
                Node::Element(element) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_block(element.name()) {
                        flush_paragraph(&mut inline, blocks);
                        self.block(child, blocks);
                    } else {
                        let rendered = self.inline(child);
                        push_fragment(&mut inline, &rendered);
                    }
                }
                _ => {}
            }
        }

        flush_paragraph(&mut inline, blocks);
    }

    fn block(&self, element: ElementRef, blocks: &mut Vec<Block>) {
        let name = element.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = escape_closing_hashes(&single_line(&self.inline_children(element)));
                if !text.is_empty() {
                    blocks.push(Block::other(format!("{} {}", "#".repeat(level), text)));
                }
            }
            "p" => {
                let mut inline = self.inline_children(element);
                flush_paragraph(&mut inline, blocks);
            }
            "ul" | "ol" => {
                let ordered = name == "ol";
                let alternate = matches!(
                    blocks.last(),
                    Some(Block { kind: BlockKind::List { ordered: o, alternate: a }, .. })
                        if *o == ordered && !*a
                );
                let text = self.list(element, ordered, alternate);
                if !text.is_empty() {
                    blocks.push(Block {
                        text,
                        kind: BlockKind::List { ordered, alternate },
                    });
                }
            }
            "pre" => {
                if let Some(code) = code_block(element) {
                    blocks.push(Block::other(code));
                }
            }
            "blockquote" => {
                let inner = join_blocks(&self.blocks(element));
                if !inner.is_empty() {
                    let quoted = inner
                        .split('\n')
                        .map(|line| {
                            if line.is_empty() {
                                ">".to_string()
                            } else {
                                format!("> {}", line)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    blocks.push(Block::other(quoted));
                }
            }
            "hr" => blocks.push(Block::other("---".to_string())),
            "table" => {
                if let Some(table) = self.table(element) {
                    blocks.push(Block::other(table));
                }
            }
            "dl" => {
                for item in element.children().filter_map(ElementRef::wrap) {
                    let mut text = single_line(&self.inline_children(item));
                    if text.is_empty() {
                        continue;
                    }
                    if item.value().name() == "dt" {
                        text = format!("**{}**", text);
                    }
                    blocks.push(Block {
                        text: escape_line_start(&text),
                        kind: BlockKind::Paragraph,
                    });
                }
            }
            _ => self.blocks_into(element, blocks),
        }
    }

    fn list(&self, element: ElementRef, ordered: bool, alternate: bool) -> String {
        let mut number: u64 = element
            .value()
            .attr("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        let mut items: Vec<String> = Vec::new();
        for item in element.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                continue;
            }
            let blocks = self.blocks(item);
            if blocks.is_empty() {
                continue;
            }

            let marker = match (ordered, alternate) {
                (true, false) => format!("{}.", number),
                (true, true) => format!("{})", number),
                (false, false) => "-".to_string(),
                (false, true) => "*".to_string(),
            };
            number += 1;

            let mut body = String::new();
            for (i, block) in blocks.iter().enumerate() {
                if i > 0 {
                    let tight = matches!(block.kind, BlockKind::List { .. });
                    body.push_str(if tight { "\n" } else { "\n\n" });
                }
                body.push_str(&block.text);
            }

            let indent = " ".repeat(marker.len() + 1);
            let mut lines = body.split('\n');
            let mut rendered = format!("{} {}", marker, lines.next().unwrap_or_default());
            for line in lines {
                rendered.push('\n');
                if !line.is_empty() {
                    rendered.push_str(&indent);
                    rendered.push_str(line);
                }
            }
            items.push(rendered);
        }

        items.join("\n")
    }

    fn table(&self, element: ElementRef) -> Option<String> {
        let row_selector = selector("tr")?;
        let mut rows: Vec<Vec<String>> = Vec::new();

        for row in element.select(&row_selector) {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(|cell| single_line(&self.inline_children(cell)).replace('|', "\\|"))
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        let columns = rows.iter().map(Vec::len).max()?;
        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (i, row) in rows.iter().enumerate() {
            let cells: Vec<&str> = (0..columns)
                .map(|c| row.get(c).map(String::as_str).unwrap_or(""))
                .collect();
            lines.push(format!("| {} |", cells.join(" | ")));
            if i == 0 {
                lines.push(format!("|{}", " --- |".repeat(columns)));
            }
        }
        Some(lines.join("\n"))
    }

    /// Concatenated inline rendering of an element's children
    fn inline_children(&self, element: ElementRef) -> String {
        let mut out = String::new();
        for child in element.children() {
            match child.value() {
                Node::Text(text) => push_text(&mut out, text),
                Node::Element(inner) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        let rendered = self.inline(child);
                        if is_block(inner.name()) {
                            push_text(&mut out, " ");
                            push_fragment(&mut out, &rendered);
                            push_text(&mut out, " ");
                        } else {
                            push_fragment(&mut out, &rendered);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn inline(&self, element: ElementRef) -> String {
        match element.value().name() {
            "br" => BREAK.to_string(),
            "strong" | "b" => wrap_emphasis(&self.inline_children(element), STRONG_OPEN, STRONG_CLOSE),
            "em" | "i" => wrap_emphasis(&self.inline_children(element), EM_OPEN, EM_CLOSE),
            "code" | "kbd" | "samp" => inline_code(&element.text().collect::<String>()),
            "img" => {
                let alt = element
                    .value()
                    .attr("alt")
                    .map(|alt| alt.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();
                if alt.is_empty() {
                    String::new()
                } else {
                    format!("{}Image: {}{}", EM_OPEN, escape_text(&alt), EM_CLOSE)
                }
            }
            "a" => self.link(element),
            "script" | "style" | "noscript" | "template" => String::new(),
            _ => self.inline_children(element),
        }
    }

    fn link(&self, element: ElementRef) -> String {
        let text = single_line(&self.inline_children(element));
        if text.is_empty() {
            return String::new();
        }

        let target = element
            .value()
            .attr("href")
            .and_then(|href| self.base.join(href.trim()).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https" | "mailto"));

        match target {
            Some(url) => format!(
                "[{}]({})",
                text,
                url.as_str().replace('(', "%28").replace(')', "%29")
            ),
            None => text,
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "body"
            | "center"
            | "dd"
            | "details"
            | "dialog"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "html"
            | "li"
            | "main"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "summary"
            | "table"
            | "tbody"
            | "td"
            | "tfoot"
            | "th"
            | "thead"
            | "tr"
            | "ul"
    )
}

/// Appends a text node with whitespace collapsed and markup escaped
fn push_text(out: &mut String, text: &str) {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_space = true;
        } else {
            if in_space {
                collapsed.push(' ');
            }
            in_space = false;
            collapsed.push(c);
        }
    }
    if in_space {
        collapsed.push(' ');
    }
    push_fragment(out, &escape_text(&collapsed));
}

/// Appends already-rendered inline Markdown, never doubling a space
fn push_fragment(out: &mut String, fragment: &str) {
    // `![` would open an image
    if fragment.starts_with('[') && ends_with_bare_bang(out) {
        out.pop();
        out.push_str("\\!");
    }
    let after_gap = out.ends_with(' ') || out.ends_with(BREAK);
    if after_gap {
        out.push_str(fragment.trim_start_matches(' '));
    } else {
        out.push_str(fragment);
    }
}

fn ends_with_bare_bang(text: &str) -> bool {
    match text.strip_suffix('!') {
        Some(rest) => rest.chars().rev().take_while(|c| *c == '\\').count() % 2 == 0,
        None => false,
    }
}

fn flush_paragraph(inline: &mut String, blocks: &mut Vec<Block>) {
    let text = resolve_emphasis(inline)
        .trim_matches(|c: char| c == ' ' || c == BREAK)
        .replace(" \u{1}", "\u{1}")
        .replace(BREAK, "\\\n");
    inline.clear();
    if text.is_empty() {
        return;
    }
    let text = text
        .split('\n')
        .map(escape_line_start)
        .collect::<Vec<_>>()
        .join("\n");
    blocks.push(Block {
        text,
        kind: BlockKind::Paragraph,
    });
}

/// Inline content flattened to one line (headings, table cells, link text)
fn single_line(inline: &str) -> String {
    resolve_emphasis(inline)
        .replace(BREAK, " ")
        .split(' ')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn wrap_emphasis(inner: &str, open: char, close: char) -> String {
    let trimmed = inner.trim_matches(|c: char| c == ' ' || c == BREAK);
    if trimmed.is_empty() {
        return if inner.is_empty() { String::new() } else { " ".to_string() };
    }
    let lead = if inner.starts_with(' ') { " " } else { "" };
    let trail = if inner.ends_with(' ') { " " } else { "" };
    format!("{}{}{}{}{}", lead, open, trimmed, close, trail)
}

fn is_emphasis_marker(c: char) -> bool {
    matches!(c, EM_OPEN | EM_CLOSE | STRONG_OPEN | STRONG_CLOSE)
}

/// Replaces emphasis placeholders with `*` and `**` delimiters
///
/// Back-to-back spans of the same kind are merged into one. A delimiter run
/// that CommonMark would not read as opening (or closing) gets a space on its
/// outer side, e.g. `foo**(bar)**baz` becomes `foo **(bar)** baz`.
fn resolve_emphasis(inline: &str) -> String {
    let mut text = inline.to_string();
    loop {
        let merged = text.replace(EM_SEAM, "").replace(STRONG_SEAM, "");
        if merged.len() == text.len() {
            break;
        }
        text = merged;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        if !is_emphasis_marker(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_emphasis_marker(chars[i]) {
            i += 1;
        }
        let run = &chars[start..i];
        let prev = out.chars().next_back();
        let next = chars.get(i).copied();

        let split = run
            .iter()
            .take_while(|c| matches!(**c, EM_CLOSE | STRONG_CLOSE))
            .count();
        let (closers, openers) = run.split_at(split);
        let gap = (!closers.is_empty() && !right_flanking(prev, next))
            || (!openers.is_empty() && !left_flanking(prev, next));

        for &c in closers {
            out.push_str(delimiter(c));
        }
        if gap {
            out.push(' ');
        }
        for &c in openers {
            out.push_str(delimiter(c));
        }
    }
    out
}

fn delimiter(marker: char) -> &'static str {
    match marker {
        STRONG_OPEN | STRONG_CLOSE => "**",
        _ => "*",
    }
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == BREAK
}

// Over-approximates CommonMark punctuation; a spurious gap is harmless
fn is_punctuation(c: char) -> bool {
    !c.is_alphanumeric() && !is_space(c)
}

fn left_flanking(prev: Option<char>, next: Option<char>) -> bool {
    match next {
        Some(n) if !is_space(n) => {
            !is_punctuation(n) || prev.map_or(true, |p| is_space(p) || is_punctuation(p))
        }
        _ => false,
    }
}

fn right_flanking(prev: Option<char>, next: Option<char>) -> bool {
    match prev {
        Some(p) if !is_space(p) => {
            !is_punctuation(p) || next.map_or(true, |n| is_space(n) || is_punctuation(n))
        }
        _ => false,
    }
}

/// Escapes a trailing run of `#` that ATX would read as a closing sequence
fn escape_closing_hashes(text: &str) -> String {
    let stem = text.trim_end_matches('#');
    if stem.len() < text.len() && (stem.is_empty() || stem.ends_with(' ')) {
        format!("{}\\{}", stem, &text[stem.len()..])
    } else {
        text.to_string()
    }
}

fn inline_code(text: &str) -> String {
    let code = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(|c: char| c == BREAK || is_emphasis_marker(c), "");
    if code.is_empty() {
        return String::new();
    }
    let longest_run = longest_run(&code, '`');
    let fence = "`".repeat(longest_run + 1);
    if longest_run > 0 || code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", fence, code, fence)
    } else {
        format!("{}{}{}", fence, code, fence)
    }
}

fn code_block(element: ElementRef) -> Option<String> {
    let code = element.text().collect::<String>();
    let code = code.trim_end_matches(['\n', '\r']).trim_start_matches('\n');
    if code.trim().is_empty() {
        return None;
    }

    let language = std::iter::once(element)
        .chain(element.children().filter_map(ElementRef::wrap))
        .flat_map(|el| el.value().classes())
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .unwrap_or_default();

    let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
    Some(format!("{}{}\n{}\n{}", fence, language, code, fence))
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Backslash-escapes characters CommonMark would read as inline markup
fn escape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' => {
                out.push('\\');
                out.push(c);
            }
            '&' if looks_like_entity(&chars[i + 1..]) => {
                out.push('\\');
                out.push(c);
            }
            c if c == BREAK || is_emphasis_marker(c) => {}
            _ => out.push(c),
        }
    }
    out
}

fn looks_like_entity(rest: &[char]) -> bool {
    let name_len = rest
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '#')
        .count();
    name_len > 0 && rest.get(name_len) == Some(&';')
}

/// Escapes a line start that would otherwise open a block construct
fn escape_line_start(line: &str) -> String {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str();

    match first {
        '#' | '>' | '=' | '~' | '+' => format!("\\{}", line),
        '-' if rest.is_empty() || rest.starts_with(' ') || rest.chars().all(|c| c == '-') => {
            format!("\\{}", line)
        }
        '0'..='9' => {
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            let after = &line[digits..];
            let is_marker = (after.starts_with('.') || after.starts_with(')'))
                && (after.len() == 1 || after[1..].starts_with(' '));
            if digits <= 9 && is_marker {
                format!("{}\\{}", &line[..digits], after)
            } else {
                line.to_string()
            }
        }
        _ => line.to_string(),
    }
}

fn join_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Trims trailing whitespace, keeps at most one blank line in a row and
/// ends the text with a single newline
fn normalize_whitespace(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in markdown.split('\n') {
        let line = line.trim_end();
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
