//! Field extraction: structured-markup tags first, then CSS selectors

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use super::text::{collapse_whitespace, element_text};
use super::types::ExtractError;
use crate::config::{meta_tag_selector, DateTimeExtractConfig, FieldExtractConfig};

/// Where a matched element's value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSource {
    /// Element text only
    Text,
    /// `datetime`/`content` attribute, then element text
    AttributeThenText,
}

/// Compiled extraction policy shared by title, intro, and datetime
#[derive(Debug)]
pub(super) struct FieldPolicy {
    field: &'static str,
    meta_selectors: Vec<Selector>,
    css_selectors: Vec<Selector>,
    source: ValueSource,
    pub(super) mandatory: bool,
}

impl FieldPolicy {
    pub(super) fn text_field(field: &'static str, config: &FieldExtractConfig) -> Result<Self, ExtractError> {
        Self::compile(
            field,
            &config.opengraph_tags,
            &config.css_selectors,
            ValueSource::Text,
            config.is_mandatory(),
        )
    }

    pub(super) fn datetime_field(config: &DateTimeExtractConfig) -> Result<Self, ExtractError> {
        Self::compile(
            "datetime",
            &config.opengraph_tags,
            &config.css_selectors,
            ValueSource::AttributeThenText,
            config.is_mandatory(),
        )
    }

    fn compile(
        field: &'static str,
        tags: &[String],
        css: &[String],
        source: ValueSource,
        mandatory: bool,
    ) -> Result<Self, ExtractError> {
        let parse = |selector: &str| {
            Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
                field,
                selector: selector.to_string(),
                message: e.to_string(),
            })
        };

        let meta_selectors = tags
            .iter()
            .map(|tag| parse(meta_tag_selector(tag).as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let css_selectors = css
            .iter()
            .map(|s| parse(s.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            field,
            meta_selectors,
            css_selectors,
            source,
            mandatory,
        })
    }

    pub(super) fn name(&self) -> &'static str {
        self.field
    }

    /// First non-empty value, structured tags before CSS selectors
    pub(super) fn extract(&self, document: &Html) -> Option<String> {
        self.extract_structured(document)
            .or_else(|| self.extract_css(document))
    }

    fn extract_structured(&self, document: &Html) -> Option<String> {
        self.meta_selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|meta| meta.value().attr("content"))
                .map(collapse_whitespace)
                .find(|content| !content.is_empty())
        })
    }

    fn extract_css(&self, document: &Html) -> Option<String> {
        self.css_selectors.iter().find_map(|selector| {
            document.select(selector).find_map(|element| {
                let attribute = match self.source {
                    ValueSource::Text => None,
                    ValueSource::AttributeThenText => element
                        .value()
                        .attr("datetime")
                        .or_else(|| element.value().attr("content"))
                        .map(collapse_whitespace)
                        .filter(|v| !v.is_empty()),
                };
                attribute
                    .or_else(|| Some(element_text(&element)))
                    .filter(|v| !v.is_empty())
            })
        })
    }
}

/// Cut `value` to `max_chars` characters, ending in `...` when shortened
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Truncate then prepend the configured prefix
pub(super) fn finish_text(value: &str, config: &FieldExtractConfig) -> String {
    format!("{}{}", config.prefix, truncate_chars(value, config.max_chars))
}

fn bare_date() -> &'static Regex {
    static BARE_DATE: OnceLock<Regex> = OnceLock::new();
    BARE_DATE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"))
}

/// Pad a bare `YYYY-MM-DD` with midnight when `only_date` is set
pub fn pad_date(raw: &str, only_date: bool) -> String {
    let raw = raw.trim();
    if only_date && bare_date().is_match(raw) {
        format!("{} 00:00:00", raw)
    } else {
        raw.to_string()
    }
}

/// Parse a date string into a UTC timestamp
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M",
    ];
    for format in datetime_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y"];
    for format in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }
    }

    None
}
