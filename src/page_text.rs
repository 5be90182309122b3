// src/page_text.rs
//! Best-effort plain text of the job description in a rendered page.
//!
//! Which part of the page holds the description is decided by a
//! [`ContentStrategy`]. The default tries a list of CSS selectors commonly used
//! by job boards; callers with site-specific knowledge can supply their own.

use crate::utils::{collapse_blank_lines, collapse_whitespace};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

/// Selectors tried in order by [`SelectorStrategy::default`].
pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "#jobDescriptionText",
    ".job-description",
    ".job-details",
    "#job-details",
    "article",
    "[role='main']",
    "main",
    "#content",
    ".content",
];

/// Subtrees whose text never belongs to a job description.
const BOILERPLATE_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "nav", "footer",
    "aside", "form", "button",
];

const PARAGRAPH_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "ul", "ol", "table",
    "blockquote", "pre", "dl",
];

const LINE_TAGS: &[&str] = &[
    "div", "main", "header", "li", "tr", "dt", "dd", "br", "hr", "label",
];

/// Minimum visible characters for a region to count as content.
const MIN_REGION_CHARS: usize = 6;

pub trait ContentStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Pick the element most likely to hold the job description, if any.
    fn select_region<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// First element matching an ordered list of CSS selectors.
pub struct SelectorStrategy {
    selectors: Vec<String>,
}

impl Default for SelectorStrategy {
    fn default() -> Self {
        Self {
            selectors: DEFAULT_CONTENT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SelectorStrategy {
    /// Use a site-specific selector list. Every selector must parse.
    pub fn with_selectors<I, S>(selectors: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selectors: Vec<String> = selectors.into_iter().map(Into::into).collect();
        if selectors.is_empty() {
            return Err("content selector list is empty".to_string());
        }
        for selector in &selectors {
            Selector::parse(selector)
                .map_err(|e| format!("invalid content selector '{}': {}", selector, e))?;
        }
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }
}

impl ContentStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        "selectors"
    }

    fn select_region<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for selector_str in &self.selectors {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            if let Some(element) = document.select(&selector).find(|el| has_content(*el)) {
                debug!("Content region matched selector '{}'", selector_str);
                return Some(element);
            }
        }
        None
    }
}

/// Block element that directly owns the most paragraph text.
#[derive(Default)]
pub struct LargestBlockStrategy;

impl LargestBlockStrategy {
    fn score(element: ElementRef<'_>) -> usize {
        element
            .children()
            .map(|child| {
                if let Some(text) = child.value().as_text() {
                    return text.trim().chars().count();
                }
                match ElementRef::wrap(child) {
                    Some(el) if !is_boilerplate(el) => match el.value().name() {
                        "p" | "ul" | "ol" | "li" | "h1" | "h2" | "h3" | "h4" | "span"
                        | "strong" | "b" | "em" | "i" => visible_text(el).chars().count(),
                        _ => 0,
                    },
                    _ => 0,
                }
            })
            .sum()
    }
}

impl ContentStrategy for LargestBlockStrategy {
    fn name(&self) -> &str {
        "largest-block"
    }

    fn select_region<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse("article, section, main, div, td").ok()?;
        let mut best: Option<(usize, ElementRef<'a>)> = None;

        for element in document.select(&selector) {
            if element.ancestors().filter_map(ElementRef::wrap).any(is_boilerplate) {
                continue;
            }
            let score = Self::score(element);
            if score > best.map(|(s, _)| s).unwrap_or(0) {
                best = Some((score, element));
            }
        }

        best.map(|(score, element)| {
            debug!(
                "Largest text block is <{}> with {} chars",
                element.value().name(),
                score
            );
            element
        })
    }
}

pub struct TextExtractor {
    strategy: Box<dyn ContentStrategy>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(Box::new(SelectorStrategy::default()))
    }
}

impl TextExtractor {
    pub fn new(strategy: Box<dyn ContentStrategy>) -> Self {
        Self { strategy }
    }

    /// Plain text of the likely description region. An empty result is
    /// returned as-is rather than treated as an error.
    pub fn extract(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let region = match self.strategy.select_region(&document) {
            Some(region) => region,
            None => {
                info!(
                    "No content region found by '{}' strategy, using <body>",
                    self.strategy.name()
                );
                body_of(&document)
            }
        };

        let mut text = visible_text(region);
        if let Some(title) = page_title(&document) {
            if !text.contains(&title) {
                text = if text.is_empty() {
                    title
                } else {
                    format!("{}\n\n{}", title, text)
                };
            }
        }

        if text.is_empty() {
            warn!("No text could be extracted from the page");
        } else {
            debug!("Extracted {} characters of page text", text.chars().count());
        }
        text
    }
}

/// Visible text under `element`, boilerplate subtrees removed. Block elements
/// start new lines, paragraphs are separated by one blank line.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    let lines: Vec<String> = raw.lines().map(collapse_whitespace).collect();
    collapse_blank_lines(&lines.join("\n"))
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_inline(out, text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if is_boilerplate(child_el) {
                continue;
            }
            let breaks = block_breaks(child_el.value().name());
            ensure_breaks(out, breaks);
            collect_text(child_el, out);
            ensure_breaks(out, breaks);
        }
    }
}

/// Source-formatting whitespace (including newlines) inside inline text
/// collapses to a single space.
fn push_inline(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !out.ends_with(|c: char| c.is_whitespace()) {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

/// Newlines a block element needs on each side: 2 for paragraphs, 1 for lines.
fn block_breaks(tag: &str) -> usize {
    if PARAGRAPH_TAGS.contains(&tag) {
        2
    } else if LINE_TAGS.contains(&tag) {
        1
    } else {
        0
    }
}

/// Top up the trailing newlines of `out` to at least `count`. Adjacent
/// blocks share their breaks instead of adding them up.
fn ensure_breaks(out: &mut String, count: usize) {
    if count == 0 {
        return;
    }
    let kept = out.trim_end_matches(' ').len();
    out.truncate(kept);
    if out.is_empty() {
        return;
    }
    let existing = out.len() - out.trim_end_matches('\n').len();
    for _ in existing..count {
        out.push('\n');
    }
}

fn is_boilerplate(element: ElementRef<'_>) -> bool {
    let el = element.value();
    BOILERPLATE_TAGS.contains(&el.name())
        || el.attr("role") == Some("navigation")
        || el.attr("hidden").is_some()
        || el.attr("aria-hidden") == Some("true")
}

fn has_content(element: ElementRef<'_>) -> bool {
    visible_text(element)
        .chars()
        .filter(|c| !c.is_whitespace())
        .count()
        >= MIN_REGION_CHARS
}

fn body_of(document: &Html) -> ElementRef<'_> {
    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element())
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?;
    let text = collapse_whitespace(&title.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}
