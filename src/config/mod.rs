//! Per-site crawler configuration

mod extraction;
mod logging;
mod request;
mod scoring;

pub use extraction::{meta_tag_selector, DateTimeExtractConfig, ExtractionConfig, FieldExtractConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use request::RequestConfig;
pub use scoring::{ContentScoringConfig, LengthCondition, LengthOperator, ScoreRule};

use anyhow::Result;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::types::StartPoint;

/// Default user agent for all HTTP requests (pages and robots.txt)
pub const DEFAULT_USER_AGENT: &str = "TeaserCrawl/1.0 (+https://github.com/teasercrawl)";

/// Query parameter stripping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripQueryConfig {
    pub enabled: bool,
    pub params: Vec<String>,
}

impl Default for StripQueryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            params: vec![
                "utm_source".to_string(),
                "utm_medium".to_string(),
                "utm_campaign".to_string(),
                "utm_term".to_string(),
                "utm_content".to_string(),
                "fbclid".to_string(),
                "gclid".to_string(),
            ],
        }
    }
}

/// Configuration for one site-run.
///
/// Loaded fresh for every run and passed by value (or `Arc`) into each
/// component, so two concurrent site-runs never share state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Site identifier, used as `sp_objecttype`/`sp_source` in the index
    pub site_id: String,
    /// Traversal roots
    pub start_points: Vec<StartPoint>,
    /// Upper bound on discovered article URLs per run
    pub max_teaser: usize,
    /// Concurrent requests per host, also the fetch/parse batch size
    pub concurrency_per_host: usize,
    /// Section of the page that link discovery is scoped to
    pub link_section_selector: String,
    /// Links inside the section
    pub link_selector: String,
    /// Keep only URLs starting with one of these (empty keeps all)
    pub allow_prefixes: Vec<String>,
    /// Drop URLs starting with one of these
    pub deny_prefixes: Vec<String>,
    /// Drop URLs whose path ends with one of these (case-insensitive)
    pub deny_endings: Vec<String>,
    pub strip_query_params: StripQueryConfig,
    pub respect_robots_txt: bool,
    pub robots_url: Option<String>,
    /// Always crawled, regardless of discovery and scoring
    pub forced_article_urls: Vec<String>,
    pub request: RequestConfig,
    pub extraction: ExtractionConfig,
    pub scoring: ContentScoringConfig,
    pub logging: LoggingConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            start_points: Vec::new(),
            max_teaser: 100,
            concurrency_per_host: 4,
            link_section_selector: "body".to_string(),
            link_selector: "a[href]".to_string(),
            allow_prefixes: Vec::new(),
            deny_prefixes: Vec::new(),
            deny_endings: vec![
                ".pdf".to_string(),
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
                ".gif".to_string(),
                ".zip".to_string(),
            ],
            strip_query_params: StripQueryConfig::default(),
            respect_robots_txt: false,
            robots_url: None,
            forced_article_urls: Vec::new(),
            request: RequestConfig::default(),
            extraction: ExtractionConfig::default(),
            scoring: ContentScoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: CrawlerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<dir>/<site_id>.toml`. The file's own `site_id` is replaced by the key.
    pub fn for_site(dir: &Path, site_id: &str) -> Result<Self> {
        let path = dir.join(format!("{}.toml", site_id));
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("No config for site '{}' at '{}': {}", site_id, path.display(), e))?;
        let mut config: CrawlerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.site_id = site_id.to_string();
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every error and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.site_id.trim().is_empty() {
            errors.push("site_id must not be empty".to_string());
        }
        if self.start_points.is_empty() {
            errors.push("at least one start point is required".to_string());
        }
        for start in &self.start_points {
            match Url::parse(&start.url) {
                Ok(url) if url.scheme() == "https" => {}
                Ok(_) => errors.push(format!("start point '{}' must use https", start.url)),
                Err(e) => errors.push(format!("start point '{}' is not a valid URL: {}", start.url, e)),
            }
        }
        if self.max_teaser == 0 {
            errors.push("max_teaser must be positive".to_string());
        }
        if self.concurrency_per_host == 0 {
            errors.push("concurrency_per_host must be positive".to_string());
        }

        let mut selectors = vec![
            ("link_section_selector", &self.link_section_selector),
            ("link_selector", &self.link_selector),
        ];
        selectors.extend(
            self.extraction
                .title
                .css_selectors
                .iter()
                .map(|s| ("extraction.title.css_selectors", s)),
        );
        selectors.extend(
            self.extraction
                .intro
                .css_selectors
                .iter()
                .map(|s| ("extraction.intro.css_selectors", s)),
        );
        selectors.extend(
            self.extraction
                .datetime
                .css_selectors
                .iter()
                .map(|s| ("extraction.datetime.css_selectors", s)),
        );
        for (field, selector) in selectors {
            if let Err(e) = Selector::parse(selector) {
                errors.push(format!("{} has invalid selector '{}': {}", field, selector, e));
            }
        }

        let tags = [
            ("extraction.title.opengraph_tags", &self.extraction.title.opengraph_tags),
            ("extraction.intro.opengraph_tags", &self.extraction.intro.opengraph_tags),
            ("extraction.datetime.opengraph_tags", &self.extraction.datetime.opengraph_tags),
        ];
        for (field, tag) in tags.into_iter().flat_map(|(field, list)| list.iter().map(move |t| (field, t))) {
            if let Err(e) = Selector::parse(&meta_tag_selector(tag)) {
                errors.push(format!("{} has unusable tag '{}': {}", field, tag, e));
            }
        }

        for (name, field) in [("title", &self.extraction.title), ("intro", &self.extraction.intro)] {
            if field.max_chars < 4 {
                errors.push(format!(
                    "extraction.{}.max_chars must be at least 4, got {}",
                    name, field.max_chars
                ));
            }
        }

        for (i, rule) in self.scoring.positive_rules.iter().enumerate() {
            if rule.score < 0 {
                errors.push(format!(
                    "scoring.positive_rules[{}] has negative score {}; use negative_rules instead",
                    i, rule.score
                ));
            }
        }

        if self.respect_robots_txt {
            match &self.robots_url {
                Some(robots) => {
                    if let Err(e) = Url::parse(robots) {
                        errors.push(format!("robots_url '{}' is not a valid URL: {}", robots, e));
                    }
                }
                None => errors.push("respect_robots_txt requires robots_url".to_string()),
            }
        }

        if self.request.user_agent.trim().is_empty() {
            errors.push("request.user_agent must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
