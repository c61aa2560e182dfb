//! Body text lookup for relevance scoring

use scraper::{ElementRef, Html, Selector};

/// Body-like regions, in priority order
const BODY_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".article-content",
    ".entry-content",
    ".post-content",
    ".content",
    "#content",
    "body",
];

pub(super) fn body_selectors() -> Vec<Selector> {
    BODY_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

/// Text of an element with whitespace collapsed, skipping script/style content
pub(super) fn element_text(element: &ElementRef) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            let inside_code = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
                    .unwrap_or(false)
            });
            if !inside_code {
                parts.push(text);
            }
        }
    }
    collapse_whitespace(&parts.join(" "))
}

pub(super) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty text among the body-like regions
pub(super) fn body_text(document: &Html, selectors: &[Selector]) -> String {
    for selector in selectors {
        for element in document.select(selector) {
            let text = element_text(&element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}
