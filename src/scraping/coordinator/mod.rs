//! Scraping coordinator sequencing one site-run
//!
//! Stages run strictly in order: Collect, then chunks of Fetch and Parse,
//! then Process, then Index. A stage that fails or produces nothing ends
//! the crawl early with an empty batch, which is still handed to the index
//! so its accounting runs. A single bad page, host, or field never aborts
//! the run.

mod pipeline;
mod types;

pub use types::*;

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    collector::UrlCollector,
    executor::{HttpTransport, RequestExecutor},
    extractor::TeaserParser,
    fetcher::Fetcher,
};
use crate::config::CrawlerConfig;
use crate::index::TeaserIndex;
use crate::types::TeaserRecord;

/// Coordinator owning every component of one site-run
pub struct ScrapingCoordinator {
    config: Arc<CrawlerConfig>,
    collector: UrlCollector,
    fetcher: Fetcher,
    /// Shared with blocking parse tasks
    parser: Arc<TeaserParser>,
    index: Arc<dyn TeaserIndex>,
}

impl ScrapingCoordinator {
    /// Build the pipeline for `config` on top of `transport`.
    ///
    /// Throttle and robots state live in the executor created here, so
    /// coordinators for different sites never share them.
    pub fn new(
        config: CrawlerConfig,
        transport: Arc<dyn HttpTransport>,
        index: Arc<dyn TeaserIndex>,
    ) -> Result<Self, SiteRunError> {
        let config = Arc::new(config);
        let executor = Arc::new(RequestExecutor::new(config.request.clone(), transport));
        let collector = UrlCollector::new(config.clone(), executor.clone())?;
        let fetcher = Fetcher::new(executor, config.concurrency_per_host);
        let parser = Arc::new(TeaserParser::new(&config)?);

        Ok(Self {
            config,
            collector,
            fetcher,
            parser,
            index,
        })
    }

    /// Coordinator fetching over HTTP with `reqwest`
    pub fn with_reqwest(config: CrawlerConfig, index: Arc<dyn TeaserIndex>) -> Result<Self, SiteRunError> {
        let transport = Arc::new(super::executor::ReqwestTransport::new(&config.request)?);
        Self::new(config, transport, index)
    }

    pub fn site_id(&self) -> &str {
        &self.config.site_id
    }

    /// Run the pipeline once and index the result.
    ///
    /// Stage failures are recorded in the summary rather than returned; only
    /// an index that cannot take the batch at all yields `Err`.
    pub async fn run(&self) -> Result<RunSummary, SiteRunError> {
        let process_id = Uuid::new_v4().to_string();
        let site_id = self.site_id();
        let mut summary = RunSummary::new(site_id, &process_id);
        info!(site = %site_id, process_id = %process_id, "Starting site run");

        let records = self.crawl(&mut summary).await;
        summary.teasers_processed = records.len();

        let status = match self.index.index(site_id, &process_id, records).await {
            Ok(status) => status,
            Err(e) => {
                error!(site = %site_id, stage = Stage::Index.as_str(), error = %e, "Indexing failed");
                return Err(e.into());
            }
        };

        if status.is_clean() {
            info!(
                site = %site_id,
                submitted = status.submitted,
                deleted_stale = status.deleted_stale,
                "Indexing finished"
            );
        } else {
            error!(
                site = %site_id,
                submitted = status.submitted,
                errors = status.errors,
                "Indexing finished with errors, stale documents kept"
            );
        }
        summary.index_status = status;

        Ok(summary)
    }

    /// Run the pipeline and report a failed stage as an error, after the
    /// run has completed and been logged.
    pub async fn run_site(&self) -> Result<RunSummary, SiteRunError> {
        let summary = self.run().await?;
        match summary.failed_stage {
            Some(stage) => Err(SiteRunError::StageFailed {
                site_id: summary.site_id,
                stage,
            }),
            None => Ok(summary),
        }
    }

    /// Collect, then fetch/parse/process chunk by chunk. Returns the final
    /// batch, empty when any stage short-circuited.
    async fn crawl(&self, summary: &mut RunSummary) -> Vec<TeaserRecord> {
        let urls = match self.collector.find_href_urls_by_css_selector().await {
            Ok(urls) => StageOutcome::completed(urls),
            Err(e) => {
                error!(site = %self.site_id(), stage = Stage::Collect.as_str(), error = %e, "URL collection failed");
                StageOutcome::failed()
            }
        };
        summary.urls_collected = urls.items.len();
        if self.short_circuit(Stage::Collect, urls.failed, urls.items.len(), summary) {
            return Vec::new();
        }

        let mut records = Vec::new();
        for chunk in urls.items.chunks(self.config.concurrency_per_host.max(1)) {
            let (pages, stats) = self.fetcher.fetch_urls(chunk).await;
            debug!(site = %self.site_id(), ?stats, "Fetched chunk");
            summary.pages_fetched += pages.len();
            if pages.is_empty() {
                continue;
            }

            let parsed = pipeline::parse_chunk(self.parser.clone(), pages).await;
            if parsed.failed {
                self.short_circuit(Stage::Parse, true, 0, summary);
                return Vec::new();
            }
            summary.teasers_parsed += parsed.items.len();
            pipeline::process_into(&mut records, parsed.items);
        }

        if self.short_circuit(Stage::Fetch, false, summary.pages_fetched, summary)
            || self.short_circuit(Stage::Parse, false, summary.teasers_parsed, summary)
            || self.short_circuit(Stage::Process, false, records.len(), summary)
        {
            return Vec::new();
        }

        records
    }

    /// Log and record a stage that failed or produced nothing
    fn short_circuit(&self, stage: Stage, failed: bool, produced: usize, summary: &mut RunSummary) -> bool {
        if failed {
            error!(site = %self.site_id(), stage = %stage, "Stage failed, indexing an empty batch");
            summary.failed_stage.get_or_insert(stage);
            return true;
        }
        if produced == 0 {
            warn!(site = %self.site_id(), stage = %stage, "Stage produced no items, indexing an empty batch");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestConfig;
    use crate::index::{IndexDocument, IndexError, IndexStatus, MemoryIndex};
    use crate::scraping::executor::{HttpResponse, RequestError};
    use crate::types::StartPoint;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Transport answering by URL; unknown URLs are 404
    struct RoutedTransport {
        routes: HashMap<String, (u16, String)>,
    }

    impl RoutedTransport {
        fn new<U, B>(routes: impl IntoIterator<Item = (U, u16, B)>) -> Arc<Self>
        where
            U: Into<String>,
            B: Into<String>,
        {
            Arc::new(Self {
                routes: routes
                    .into_iter()
                    .map(|(url, status, body)| (url.into(), (status, body.into())))
                    .collect(),
            })
        }

        fn empty() -> Arc<Self> {
            Self::new(Vec::<(String, u16, String)>::new())
        }
    }

    #[async_trait]
    impl HttpTransport for RoutedTransport {
        async fn get(&self, url: &str, _user_agent: &str) -> Result<HttpResponse, RequestError> {
            match self.routes.get(url) {
                Some((status, body)) => Ok(HttpResponse::new(*status, vec![], body.clone())),
                None => Ok(HttpResponse::new(404, vec![], "")),
            }
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl TeaserIndex for BrokenIndex {
        async fn index(&self, _: &str, _: &str, _: Vec<TeaserRecord>) -> Result<IndexStatus, IndexError> {
            Err(IndexError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed")))
        }
    }

    const START: &str = "https://news.example.com/";

    fn listing(links: &[&str]) -> String {
        let anchors: String = links.iter().map(|l| format!(r#"<a href="{}">x</a>"#, l)).collect();
        format!(r#"<html><body><div id="content">{}</div></body></html>"#, anchors)
    }

    fn config() -> CrawlerConfig {
        let mut config = CrawlerConfig {
            site_id: "news".to_string(),
            start_points: vec![StartPoint::new(START, 0)],
            link_section_selector: "#content".to_string(),
            concurrency_per_host: 2,
            request: RequestConfig {
                max_retry: 1,
                throttle_delay_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        config.extraction.title.opengraph_tags = Vec::new();
        config.extraction.title.css_selectors = vec!["h1".to_string()];
        config
    }

    fn stale_document() -> IndexDocument {
        IndexDocument {
            id: "https://news.example.com/old".to_string(),
            title: "Old".to_string(),
            sp_intro: None,
            sp_date: None,
            url: "https://news.example.com/old".to_string(),
            sp_objecttype: "news".to_string(),
            crawl_process_id: "previous".to_string(),
            sp_source: vec!["news".to_string()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_cover_every_collected_url() {
        let links = ["/a", "/b", "/c", "/d", "/e"];
        let mut routes = vec![(START.to_string(), 200, listing(&links))];
        routes.extend(links.iter().map(|l| {
            (format!("https://news.example.com{}", l), 200, format!("<h1>Story {}</h1>", l))
        }));

        let index = Arc::new(MemoryIndex::new());
        let coordinator = ScrapingCoordinator::new(config(), RoutedTransport::new(routes), index.clone()).unwrap();
        let summary = coordinator.run_site().await.unwrap();

        assert_eq!(summary.urls_collected, 5);
        assert_eq!(summary.pages_fetched, 5);
        assert_eq!(summary.teasers_processed, 5);
        assert_eq!(summary.failed_stage, None);
        assert_eq!(index.documents("news").len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_collection_still_indexes() {
        let listing = listing(&[]);
        let index = Arc::new(MemoryIndex::new());
        index.insert(stale_document());
        let coordinator =
            ScrapingCoordinator::new(config(), RoutedTransport::new([(START, 200, listing.as_str())]), index.clone()).unwrap();

        let summary = coordinator.run_site().await.unwrap();

        assert_eq!(summary.urls_collected, 0);
        assert_eq!(summary.failed_stage, None);
        assert_eq!(summary.index_status.deleted_stale, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_failure_reported_after_indexing() {
        let index = Arc::new(MemoryIndex::new());
        let coordinator = ScrapingCoordinator::new(config(), RoutedTransport::empty(), index.clone()).unwrap();

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.failed_stage, Some(Stage::Collect));
        assert_eq!(summary.index_status, IndexStatus::default());

        let err = coordinator.run_site().await.unwrap_err();
        assert!(matches!(err, SiteRunError::StageFailed { stage: Stage::Collect, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfetchable_pages_short_circuit() {
        let listing = listing(&["/gone"]);
        let index = Arc::new(MemoryIndex::new());
        let coordinator =
            ScrapingCoordinator::new(config(), RoutedTransport::new([(START, 200, listing.as_str())]), index.clone()).unwrap();

        let summary = coordinator.run_site().await.unwrap();
        assert_eq!(summary.urls_collected, 1);
        assert_eq!(summary.pages_fetched, 0);
        assert_eq!(summary.teasers_processed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_index_failure_is_not_an_error() {
        let listing = listing(&["/a"]);
        let index = Arc::new(MemoryIndex::rejecting(["https://news.example.com/a"]));
        index.insert(stale_document());
        let transport = RoutedTransport::new([
            (START, 200, listing.as_str()),
            ("https://news.example.com/a", 200, "<h1>A</h1>"),
        ]);
        let coordinator = ScrapingCoordinator::new(config(), transport, index.clone()).unwrap();

        let summary = coordinator.run_site().await.unwrap();
        assert_eq!(summary.index_status.errors, 1);
        assert_eq!(summary.index_status.deleted_stale, 0);
        assert_eq!(index.documents("news").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_error_propagates() {
        let listing = listing(&[]);
        let coordinator =
            ScrapingCoordinator::new(config(), RoutedTransport::new([(START, 200, listing.as_str())]), Arc::new(BrokenIndex))
                .unwrap();
        assert!(matches!(coordinator.run().await, Err(SiteRunError::Index(_))));
    }

    #[test]
    fn test_invalid_selector_fails_setup() {
        let mut cfg = config();
        cfg.extraction.title.css_selectors = vec!["h1[".to_string()];
        let result = ScrapingCoordinator::new(cfg, RoutedTransport::empty(), Arc::new(MemoryIndex::new()));
        assert!(matches!(result, Err(SiteRunError::Parser(_))));
    }
}
