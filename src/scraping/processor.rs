//! Text sanitization for parsed teasers
//!
//! Produces cleaned records lazily, one per valid candidate, in input order.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::extractor::truncate_chars;
use crate::types::{TeaserCandidate, TeaserRecord};

/// Hard cap on title length after cleaning
pub const MAX_CLEAN_TITLE_CHARS: usize = 120;

fn script_or_style() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .expect("valid script/style regex")
    })
}

fn markup_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

/// Remove script/style blocks and tags, decode entities, collapse whitespace
pub fn clean_text(text: &str) -> String {
    let without_code = script_or_style().replace_all(text, " ");
    let without_tags = markup_tag().replace_all(&without_code, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lazily sanitize candidates into index records.
///
/// Candidates missing a URL or title, or whose title cleans to nothing,
/// are skipped.
pub fn sanitize_text<I>(candidates: I) -> impl Iterator<Item = TeaserRecord>
where
    I: IntoIterator<Item = TeaserCandidate>,
{
    candidates.into_iter().filter_map(sanitize_one)
}

fn sanitize_one(candidate: TeaserCandidate) -> Option<TeaserRecord> {
    if candidate.url.trim().is_empty() || candidate.title.trim().is_empty() {
        warn!(url = %candidate.url, "Skipping teaser without url or title");
        return None;
    }

    let title = truncate_chars(&clean_text(&candidate.title), MAX_CLEAN_TITLE_CHARS);
    if title.is_empty() {
        warn!(url = %candidate.url, "Title is empty after cleaning");
        return None;
    }

    let intro_text = candidate
        .intro_text
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty());
    let date = candidate
        .datetime
        .map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string());

    Some(TeaserRecord {
        url: candidate.url,
        title,
        intro_text,
        date,
    })
}
