//! Teaser extraction from HTML
//!
//! Each field is read from structured markup (OpenGraph and similar meta
//! tags) first, then from CSS selectors. Candidates without a title, or
//! without a field the site marks as always present, are discarded.
//! Optional relevance scoring runs last.

mod fields;
mod scoring;
mod text;
mod types;

pub use fields::{pad_date, parse_datetime, truncate_chars};
pub use scoring::{normalize_text, RelevanceEvaluator, ScoringContext, FRAGMENT_PENALTY};
pub use types::*;

use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::{CrawlerConfig, FieldExtractConfig};
use crate::types::{FetchedPage, TeaserCandidate};
use fields::FieldPolicy;

/// Parser for one site-run
pub struct TeaserParser {
    title_config: FieldExtractConfig,
    intro_config: FieldExtractConfig,
    title: FieldPolicy,
    intro: FieldPolicy,
    datetime: FieldPolicy,
    only_date: bool,
    body_selectors: Vec<Selector>,
    evaluator: Option<RelevanceEvaluator>,
    forced_urls: HashSet<String>,
}

impl TeaserParser {
    pub fn new(config: &CrawlerConfig) -> Result<Self, ExtractError> {
        let extraction = &config.extraction;
        let evaluator = config
            .scoring
            .enabled
            .then(|| RelevanceEvaluator::new(&config.scoring, &config.forced_article_urls));

        Ok(Self {
            title: FieldPolicy::text_field("title", &extraction.title)?,
            intro: FieldPolicy::text_field("intro", &extraction.intro)?,
            datetime: FieldPolicy::datetime_field(&extraction.datetime)?,
            title_config: extraction.title.clone(),
            intro_config: extraction.intro.clone(),
            only_date: extraction.datetime.only_date,
            body_selectors: text::body_selectors(),
            evaluator,
            forced_urls: config.forced_article_urls.iter().cloned().collect(),
        })
    }

    /// Extract teasers from a batch; a failing page is logged and skipped
    pub fn extract_teasers(&self, pages: Vec<FetchedPage>) -> Vec<TeaserCandidate> {
        pages
            .into_iter()
            .filter_map(|page| match self.extract_teaser(&page) {
                Ok(Ok(candidate)) => Some(candidate),
                Ok(Err(rejection)) => {
                    debug!(url = %page.url, reason = rejection.as_str(), "Discarding page");
                    None
                }
                Err(e) => {
                    warn!(url = %page.url, error = %e, "Failed to extract teaser");
                    None
                }
            })
            .collect()
    }

    /// Extract a single teaser, or the business reason it was rejected
    pub fn extract_teaser(&self, page: &FetchedPage) -> Result<Result<TeaserCandidate, Rejection>, ExtractError> {
        if page.html.trim().is_empty() {
            return Ok(Err(Rejection::EmptyHtml));
        }
        if page.html.len() > MAX_HTML_BYTES {
            return Err(ExtractError::TooLarge(page.html.len()));
        }

        let document = Html::parse_document(&page.html);

        let Some(raw_title) = self.title.extract(&document) else {
            return Ok(Err(Rejection::MissingTitle));
        };
        let title = fields::finish_text(&raw_title, &self.title_config);

        let intro_text = self
            .intro
            .extract(&document)
            .map(|intro| fields::finish_text(&intro, &self.intro_config));
        if intro_text.is_none() && self.intro.mandatory {
            return Ok(Err(Rejection::MissingIntro));
        }

        let datetime = self
            .datetime
            .extract(&document)
            .and_then(|raw| {
                let padded = pad_date(&raw, self.only_date);
                let parsed = parse_datetime(&padded);
                if parsed.is_none() {
                    debug!(url = %page.url, field = self.datetime.name(), value = %raw, "Unparsable datetime");
                }
                parsed
            });
        if datetime.is_none() && self.datetime.mandatory {
            return Ok(Err(Rejection::MissingDatetime));
        }

        if let Some(evaluator) = &self.evaluator {
            // Forced URLs bypass scoring; they are always crawled
            if !self.forced_urls.contains(&page.url) {
                let body_text = text::body_text(&document, &self.body_selectors);
                let context = ScoringContext {
                    url: &page.url,
                    title: &title,
                    intro_text: intro_text.as_deref(),
                    body_text: &body_text,
                };
                if !evaluator.is_relevant(&context) {
                    debug!(url = %page.url, score = evaluator.score(&context), "Not relevant");
                    return Ok(Err(Rejection::NotRelevant));
                }
            }
        }

        Ok(Ok(TeaserCandidate {
            url: page.url.clone(),
            title,
            intro_text,
            datetime,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DateTimeExtractConfig, ScoreRule};

    fn page(url: &str, html: &str) -> FetchedPage {
        FetchedPage {
            url: url.to_string(),
            html: html.to_string(),
        }
    }

    fn config() -> CrawlerConfig {
        let mut config = CrawlerConfig::default();
        config.extraction.title.opengraph_tags = vec!["og:title".to_string()];
        config.extraction.title.css_selectors = vec!["h1".to_string()];
        config
    }

    #[test]
    fn test_extracts_title_intro_and_date() {
        let mut cfg = config();
        cfg.extraction.intro.opengraph_tags = vec!["og:description".to_string()];
        cfg.extraction.datetime = DateTimeExtractConfig {
            css_selectors: vec!["time".to_string()],
            only_date: true,
            ..Default::default()
        };
        let parser = TeaserParser::new(&cfg).unwrap();

        let html = r#"<html><head><meta property="og:description" content="Short intro"></head>
            <body><h1>Opening</h1><time datetime="2024-05-01">May 1</time></body></html>"#;
        let teasers = parser.extract_teasers(vec![page("https://e.com/a", html)]);

        assert_eq!(teasers.len(), 1);
        assert_eq!(teasers[0].title, "Opening");
        assert_eq!(teasers[0].intro_text.as_deref(), Some("Short intro"));
        assert_eq!(
            teasers[0].datetime.map(|d| d.to_rfc3339()),
            Some("2024-05-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_title_is_mandatory() {
        let parser = TeaserParser::new(&config()).unwrap();
        let teasers = parser.extract_teasers(vec![page("https://e.com/a", "<p>No heading</p>")]);
        assert!(teasers.is_empty());
    }

    #[test]
    fn test_title_truncated_to_max_chars() {
        let parser = TeaserParser::new(&config()).unwrap();
        let long = "x".repeat(130);
        let html = format!("<h1>{}</h1>", long);
        let teasers = parser.extract_teasers(vec![page("https://e.com/a", &html)]);

        assert_eq!(teasers[0].title.chars().count(), 120);
        assert!(teasers[0].title.ends_with("..."));
    }

    #[test]
    fn test_present_intro_required() {
        let mut cfg = config();
        cfg.extraction.intro.present = true;
        cfg.extraction.intro.css_selectors = vec![".lead".to_string()];
        let parser = TeaserParser::new(&cfg).unwrap();

        let without = page("https://e.com/a", "<h1>Title</h1>");
        let with = page("https://e.com/b", r#"<h1>Title</h1><p class="lead">Lead</p>"#);
        let teasers = parser.extract_teasers(vec![without, with]);

        assert_eq!(teasers.len(), 1);
        assert_eq!(teasers[0].url, "https://e.com/b");
    }

    #[test]
    fn test_present_datetime_must_parse() {
        let mut cfg = config();
        cfg.extraction.datetime.present = true;
        cfg.extraction.datetime.css_selectors = vec![".date".to_string()];
        let parser = TeaserParser::new(&cfg).unwrap();

        let bad = page("https://e.com/a", r#"<h1>T</h1><span class="date">soon</span>"#);
        assert_eq!(
            parser.extract_teaser(&bad).unwrap(),
            Err(Rejection::MissingDatetime)
        );
    }

    #[test]
    fn test_optional_datetime_unparsable_is_dropped() {
        let mut cfg = config();
        cfg.extraction.datetime.css_selectors = vec![".date".to_string()];
        let parser = TeaserParser::new(&cfg).unwrap();

        let p = page("https://e.com/a", r#"<h1>T</h1><span class="date">soon</span>"#);
        let teaser = parser.extract_teaser(&p).unwrap().unwrap();
        assert!(teaser.datetime.is_none());
    }

    #[test]
    fn test_oversized_and_empty_pages_skipped() {
        let parser = TeaserParser::new(&config()).unwrap();
        let huge = format!("<h1>T</h1>{}", " ".repeat(MAX_HTML_BYTES));

        assert!(matches!(
            parser.extract_teaser(&page("https://e.com/big", &huge)),
            Err(ExtractError::TooLarge(_))
        ));
        assert_eq!(
            parser.extract_teaser(&page("https://e.com/empty", "  ")).unwrap(),
            Err(Rejection::EmptyHtml)
        );

        let teasers = parser.extract_teasers(vec![
            page("https://e.com/big", &huge),
            page("https://e.com/ok", "<h1>Fine</h1>"),
        ]);
        assert_eq!(teasers.len(), 1);
    }

    #[test]
    fn test_prefix_applied() {
        let mut cfg = config();
        cfg.extraction.title.prefix = "News: ".to_string();
        let parser = TeaserParser::new(&cfg).unwrap();
        let teaser = parser
            .extract_teaser(&page("https://e.com/a", "<h1>Launch</h1>"))
            .unwrap()
            .unwrap();
        assert_eq!(teaser.title, "News: Launch");
    }

    #[test]
    fn test_scoring_filters_and_forced_urls_bypass() {
        let mut cfg = config();
        cfg.scoring.enabled = true;
        cfg.scoring.min_score = 5;
        cfg.scoring.positive_rules = vec![ScoreRule::terms(6, &["apply"])];
        cfg.forced_article_urls = vec!["https://e.com/forced".to_string()];
        let parser = TeaserParser::new(&cfg).unwrap();

        let teasers = parser.extract_teasers(vec![
            page("https://e.com/yes", "<h1>Job</h1><article>Apply here</article>"),
            page("https://e.com/no", "<h1>Job</h1><article>Read more</article>"),
            page("https://e.com/forced", "<h1>Job</h1><article>Read more</article>"),
        ]);

        let urls: Vec<_> = teasers.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://e.com/yes", "https://e.com/forced"]);
    }

    #[test]
    fn test_unusable_meta_tag_rejected_by_parser_and_validation() {
        let mut cfg = config();
        cfg.start_points = vec![crate::types::StartPoint::new("https://e.com/", 0)];
        cfg.extraction.title.opengraph_tags = vec![r#"og:title"]"#.to_string()];

        assert!(matches!(
            TeaserParser::new(&cfg),
            Err(ExtractError::InvalidSelector { field: "title", .. })
        ));
        assert!(cfg.validate().is_err());
    }
}
