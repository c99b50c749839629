use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[content]").unwrap());
static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Title and meta tags of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

impl PageMetadata {
    /// Fills fields missing here from `other`
    pub fn union(&mut self, other: &PageMetadata) {
        if self.title.is_none() {
            self.title = other.title.clone();
        }
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        if self.keywords.is_none() {
            self.keywords = other.keywords.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.keywords.is_none()
    }
}

pub(crate) fn extract_metadata(document: &Html) -> PageMetadata {
    let description = meta_content(document, "name", "description")
        .or_else(|| meta_content(document, "property", "og:description"));

    PageMetadata {
        title: document
            .select(&TITLE)
            .next()
            .and_then(|element| non_empty(collapse_whitespace(&element.text().collect::<String>()))),
        description,
        keywords: meta_content(document, "name", "keywords"),
    }
}

/// Text of the first `limit` h1-h3 headings, in document order
pub(crate) fn extract_headings(document: &Html, limit: usize) -> Vec<String> {
    document
        .select(&HEADINGS)
        .filter_map(|element| non_empty(collapse_whitespace(&element.text().collect::<String>())))
        .take(limit)
        .collect()
}

/// Visible text fragments of the body (whole document if there is no body)
///
/// Fragments inside scripts, styles and similar elements are skipped.
pub(crate) fn visible_text_fragments(document: &Html) -> Vec<&str> {
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut fragments = Vec::new();
    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| HIDDEN_ELEMENTS.contains(&parent.value().name()))
                .unwrap_or(false);
            let text: &str = text;
            if !hidden && !text.trim().is_empty() {
                fragments.push(text.trim());
            }
        }
    }
    fragments
}

/// Joins fragments, collapses whitespace and caps the result at `max_chars`
pub(crate) fn text_excerpt(fragments: &[&str], max_chars: usize) -> Option<String> {
    let joined = collapse_whitespace(&fragments.join(" "));
    let excerpt: String = joined.chars().take(max_chars).collect();
    non_empty(excerpt.trim_end().to_string())
}

/// Content of the first non-empty `<meta>` whose `attr` equals `value` (ASCII case-insensitive)
fn meta_content(document: &Html, attr: &str, value: &str) -> Option<String> {
    document
        .select(&META)
        .filter(|element| {
            element
                .value()
                .attr(attr)
                .map(|v| v.trim().eq_ignore_ascii_case(value))
                .unwrap_or(false)
        })
        .filter_map(|element| element.value().attr("content"))
        .find_map(|content| non_empty(collapse_whitespace(content)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}
