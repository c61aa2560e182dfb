//! Breadth-first article URL discovery from the configured start points

use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::executor::RequestExecutor;
use super::normalizer::UrlNormalizer;
use super::politeness::RobotsChecker;
use crate::config::CrawlerConfig;

/// Errors that abort URL collection
#[derive(Debug, Error)]
pub enum CollectError {
    /// A start page could not be downloaded, so nothing can be discovered
    #[error("Failed to fetch seed page {url}: {reason}")]
    SeedFetchFailed { url: String, reason: String },
    /// A page reached by following links could not be downloaded
    #[error("Failed to fetch page {url} at depth {depth}: {reason}")]
    PageFetchFailed { url: String, depth: usize, reason: String },
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, CollectError> {
    Selector::parse(selector).map_err(|e| CollectError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Queue entry: URL, its depth, and the depth bound of its start point
struct QueuedUrl {
    url: String,
    depth: usize,
    max_depth: usize,
}

/// URL collector for one site-run
pub struct UrlCollector {
    config: Arc<CrawlerConfig>,
    executor: Arc<RequestExecutor>,
    normalizer: UrlNormalizer,
    robots: RobotsChecker,
    section_selector: Selector,
    link_selector: Selector,
}

impl UrlCollector {
    pub fn new(config: Arc<CrawlerConfig>, executor: Arc<RequestExecutor>) -> Result<Self, CollectError> {
        let section_selector = parse_selector(&config.link_section_selector)?;
        let link_selector = parse_selector(&config.link_selector)?;
        let normalizer = UrlNormalizer::new(&config);
        let robots = RobotsChecker::new(config.robots_url.clone(), executor.clone());

        Ok(Self {
            config,
            executor,
            normalizer,
            robots,
            section_selector,
            link_selector,
        })
    }

    /// Discover article URLs for this run.
    ///
    /// Links are followed breadth-first up to each start point's depth; the
    /// result is normalized, robots-filtered, capped at `max_teaser`, and
    /// always contains the forced article URLs.
    pub async fn find_href_urls_by_css_selector(&self) -> Result<Vec<String>, CollectError> {
        let max_teaser = self.config.max_teaser;
        let mut queue: VecDeque<QueuedUrl> = self
            .config
            .start_points
            .iter()
            .map(|start| QueuedUrl {
                url: start.url.clone(),
                depth: 0,
                max_depth: start.extraction_depth,
            })
            .collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut found: Vec<String> = Vec::new();
        let mut found_set: HashSet<String> = HashSet::new();

        'traversal: while let Some(entry) = queue.pop_front() {
            if entry.depth > entry.max_depth || visited.contains(&entry.url) {
                continue;
            }
            visited.insert(entry.url.clone());

            let html = self.fetch_page(&entry).await?;

            let base = match Url::parse(&entry.url) {
                Ok(base) => base,
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "Unparsable page URL, skipping page links");
                    continue;
                }
            };
            let Some(links) = self.discover_links(&html, &base) else {
                warn!(
                    url = %entry.url,
                    selector = %self.config.link_section_selector,
                    "Link section not found, skipping page links"
                );
                continue;
            };
            debug!(url = %entry.url, depth = entry.depth, links = links.len(), "Discovered links");

            for link in links {
                if self.normalizer.is_denied(&link) || !self.normalizer.is_allowed(&link) {
                    continue;
                }

                if found_set.insert(link.clone()) {
                    found.push(link.clone());
                }
                if found.len() >= max_teaser {
                    break 'traversal;
                }

                if entry.depth < entry.max_depth && !visited.contains(&link) {
                    queue.push_back(QueuedUrl {
                        url: link,
                        depth: entry.depth + 1,
                        max_depth: entry.max_depth,
                    });
                }
            }
        }

        let mut urls = self.normalizer.normalize(&found);
        if self.config.respect_robots_txt {
            urls = self.robots.filter_allowed(&urls).await;
        }
        urls.truncate(max_teaser);

        for forced in &self.config.forced_article_urls {
            if !urls.contains(forced) {
                urls.push(forced.clone());
            }
        }

        info!(
            site = %self.config.site_id,
            pages_visited = visited.len(),
            urls = urls.len(),
            "URL collection finished"
        );
        Ok(urls)
    }

    /// Download a traversal page. Any failure aborts the collection.
    async fn fetch_page(&self, entry: &QueuedUrl) -> Result<String, CollectError> {
        let reason = match self.executor.request(&entry.url).await {
            Some(response) if response.is_success() => match response.into_text() {
                Ok(body) => return Ok(body),
                Err(e) => e.to_string(),
            },
            Some(response) => format!("HTTP status {}", response.status),
            None => "no response".to_string(),
        };

        let url = entry.url.clone();
        Err(match entry.depth {
            0 => CollectError::SeedFetchFailed { url, reason },
            depth => CollectError::PageFetchFailed { url, depth, reason },
        })
    }

    /// Absolute `https://` link targets inside the link section, or `None`
    /// when the page has no such section
    fn discover_links(&self, html: &str, base: &Url) -> Option<Vec<String>> {
        let document = Html::parse_document(html);

        let mut sections = document.select(&self.section_selector).peekable();
        sections.peek()?;

        let links = sections
            .flat_map(|section| section.select(&self.link_selector).collect::<Vec<_>>())
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| base.join(href.trim()).ok())
            .filter(|url| url.scheme() == "https")
            .map(|url| url.to_string())
            .collect();

        Some(links)
    }
}
