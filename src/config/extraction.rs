//! Field extraction policies for title, intro text, and datetime

use serde::{Deserialize, Deserializer, Serialize};

/// CSS selector for the `<meta>` elements carrying a structured-markup tag
pub fn meta_tag_selector(tag: &str) -> String {
    format!(r#"meta[property="{tag}"], meta[name="{tag}"], meta[itemprop="{tag}"]"#)
}

/// Extraction policy for a text field (title or intro)
///
/// Structured-markup tags are always tried before CSS selectors and the
/// first non-empty match wins.
#[derive(Debug, Clone, Serialize)]
pub struct FieldExtractConfig {
    /// Whether the field is expected on every page; pages without it are rejected
    pub present: bool,
    /// Whether the record is unusable without this field
    pub required_field: bool,
    /// Prefix prepended after extraction and truncation
    pub prefix: String,
    /// Structured-markup property names (`og:title`, `twitter:description`, ...)
    pub opengraph_tags: Vec<String>,
    /// CSS selectors tried in order after the structured tags
    pub css_selectors: Vec<String>,
    /// Maximum characters kept, including the `...` ellipsis
    pub max_chars: usize,
}

impl FieldExtractConfig {
    /// Title defaults: required, `og:title` then the first `h1`
    pub fn title() -> Self {
        Self {
            present: true,
            required_field: true,
            prefix: String::new(),
            opengraph_tags: vec!["og:title".to_string()],
            css_selectors: vec!["h1".to_string(), "title".to_string()],
            max_chars: 120,
        }
    }

    /// Intro defaults: optional description
    pub fn intro() -> Self {
        Self {
            present: false,
            required_field: false,
            prefix: String::new(),
            opengraph_tags: vec!["og:description".to_string(), "description".to_string()],
            css_selectors: Vec::new(),
            max_chars: 300,
        }
    }

    /// Whether a missing value discards the candidate
    pub fn is_mandatory(&self) -> bool {
        self.present || self.required_field
    }
}

/// Keys given in a `[extraction.title]` or `[extraction.intro]` table;
/// anything left out keeps that field's own default
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FieldOverrides {
    present: Option<bool>,
    required_field: Option<bool>,
    prefix: Option<String>,
    opengraph_tags: Option<Vec<String>>,
    css_selectors: Option<Vec<String>>,
    max_chars: Option<usize>,
}

impl FieldOverrides {
    fn apply(self, base: FieldExtractConfig) -> FieldExtractConfig {
        FieldExtractConfig {
            present: self.present.unwrap_or(base.present),
            required_field: self.required_field.unwrap_or(base.required_field),
            prefix: self.prefix.unwrap_or(base.prefix),
            opengraph_tags: self.opengraph_tags.unwrap_or(base.opengraph_tags),
            css_selectors: self.css_selectors.unwrap_or(base.css_selectors),
            max_chars: self.max_chars.unwrap_or(base.max_chars),
        }
    }
}

fn title_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FieldExtractConfig, D::Error> {
    FieldOverrides::deserialize(deserializer).map(|o| o.apply(FieldExtractConfig::title()))
}

fn intro_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FieldExtractConfig, D::Error> {
    FieldOverrides::deserialize(deserializer).map(|o| o.apply(FieldExtractConfig::intro()))
}

/// Extraction policy for the publication datetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DateTimeExtractConfig {
    pub present: bool,
    pub required_field: bool,
    pub opengraph_tags: Vec<String>,
    pub css_selectors: Vec<String>,
    /// Pad bare `YYYY-MM-DD` values with a midnight time
    pub only_date: bool,
}

impl DateTimeExtractConfig {
    pub fn is_mandatory(&self) -> bool {
        self.present || self.required_field
    }
}

impl Default for DateTimeExtractConfig {
    fn default() -> Self {
        Self {
            present: false,
            required_field: false,
            opengraph_tags: vec!["article:published_time".to_string()],
            css_selectors: vec!["time[datetime]".to_string()],
            only_date: false,
        }
    }
}

/// Extraction policies for all teaser fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    #[serde(deserialize_with = "title_field")]
    pub title: FieldExtractConfig,
    #[serde(deserialize_with = "intro_field")]
    pub intro: FieldExtractConfig,
    pub datetime: DateTimeExtractConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            title: FieldExtractConfig::title(),
            intro: FieldExtractConfig::intro(),
            datetime: DateTimeExtractConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_tables_keep_field_defaults() {
        let config: ExtractionConfig = toml::from_str(
            r#"
[title]
css_selectors = ["h1.headline"]

[intro]
present = true
"#,
        )
        .unwrap();

        assert_eq!(config.title.css_selectors, vec!["h1.headline"]);
        assert_eq!(config.title.max_chars, 120);
        assert_eq!(config.title.opengraph_tags, vec!["og:title"]);
        assert!(config.title.is_mandatory());

        assert!(config.intro.present);
        assert_eq!(config.intro.max_chars, 300);
        assert_eq!(config.datetime.css_selectors, vec!["time[datetime]"]);
    }

    #[test]
    fn test_unknown_field_key_rejected() {
        assert!(toml::from_str::<ExtractionConfig>("[title]\nmax_char = 10\n").is_err());
    }
}
