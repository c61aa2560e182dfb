//! Integration tests for teasercrawl
//!
//! These drive whole site-runs against an in-memory transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use teasercrawl::{
    config::{CrawlerConfig, ScoreRule},
    index::{IndexDocument, JsonLinesIndex, MemoryIndex},
    scraping::{HttpResponse, HttpTransport, RequestError, ScrapingCoordinator, SiteRunError, Stage},
    types::StartPoint,
};
use tempfile::TempDir;
use tokio::time::{Duration, Instant};

/// Serves fixed responses by URL and records every request
#[derive(Default)]
struct SiteTransport {
    routes: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<(String, String, Instant)>>,
}

impl SiteTransport {
    fn with_page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(url.to_string(), (status, body.to_string()));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(url, _, _)| url.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for SiteTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<HttpResponse, RequestError> {
        self.requests
            .lock()
            .push((url.to_string(), user_agent.to_string(), Instant::now()));
        match self.routes.get(url) {
            Some((status, body)) => Ok(HttpResponse::new(*status, vec![], body.clone())),
            None => Err(RequestError::Transport(format!("connection refused: {}", url))),
        }
    }
}

fn site_config(site_id: &str, start: &str) -> CrawlerConfig {
    let mut config = CrawlerConfig {
        site_id: site_id.to_string(),
        start_points: vec![StartPoint::new(start, 0)],
        max_teaser: 10,
        link_section_selector: "#content".to_string(),
        ..Default::default()
    };
    config.request.max_retry = 1;
    config.request.throttle_delay_ms = 200;
    config.extraction.title.opengraph_tags = Vec::new();
    config.extraction.title.css_selectors = vec!["h1".to_string()];
    config
}

const START: &str = "https://news.example.com/";
const ARTICLE: &str = "https://news.example.com/articles/1";

fn start_page() -> String {
    format!(
        r#"<html><body><h1>Title</h1><div id="content"><a href="{}">Story</a></div></body></html>"#,
        ARTICLE
    )
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_single_article() {
    let transport = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, &start_page())
            .with_page(ARTICLE, 200, "<html><body><h1>Title</h1><p>Body</p></body></html>"),
    );
    let index = Arc::new(MemoryIndex::new());
    let coordinator =
        ScrapingCoordinator::new(site_config("news", START), transport.clone(), index.clone()).unwrap();

    let summary = coordinator.run_site().await.unwrap();

    assert_eq!(summary.urls_collected, 1);
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.teasers_parsed, 1);
    assert_eq!(summary.teasers_processed, 1);
    assert_eq!(summary.index_status.submitted, 1);

    let docs = index.documents("news");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, ARTICLE);
    assert_eq!(docs[0].title, "Title");
    assert_eq!(docs[0].sp_source, vec!["news".to_string()]);
    assert_eq!(docs[0].crawl_process_id, summary.process_id);

    // Start page and article are on one host, so the throttle spaced them
    let requests = transport.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].2 - requests[0].2 >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_second_run_replaces_previous_documents() {
    let first = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, &start_page())
            .with_page(ARTICLE, 200, "<h1>First</h1>"),
    );
    let index = Arc::new(MemoryIndex::new());
    ScrapingCoordinator::new(site_config("news", START), first, index.clone())
        .unwrap()
        .run_site()
        .await
        .unwrap();

    let listing = r#"<div id="content"><a href="/articles/2">Next</a></div>"#;
    let second = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, listing)
            .with_page("https://news.example.com/articles/2", 200, "<h1>Second</h1>"),
    );
    let summary = ScrapingCoordinator::new(site_config("news", START), second, index.clone())
        .unwrap()
        .run_site()
        .await
        .unwrap();

    assert_eq!(summary.index_status.deleted_stale, 1);
    let titles: Vec<_> = index.documents("news").into_iter().map(|d| d.title).collect();
    assert_eq!(titles, vec!["Second"]);
}

#[tokio::test(start_paused = true)]
async fn test_robots_scoring_and_forced_urls() {
    let listing = r#"<div id="content">
        <a href="/jobs/developer">Developer</a>
        <a href="/jobs/closed">Closed</a>
        <a href="/private/admin">Admin</a>
        <a href="/brochure.pdf">Brochure</a>
    </div>"#;
    let transport = Arc::new(
        SiteTransport::default()
            .with_page("https://jobs.example.com/", 200, listing)
            .with_page("https://jobs.example.com/robots.txt", 200, "User-agent: *\nDisallow: /private/\n")
            .with_page("https://jobs.example.com/jobs/developer", 200, "<h1>Developer</h1><article>Apply now</article>")
            .with_page("https://jobs.example.com/jobs/closed", 200, "<h1>Closed</h1><article>Position filled</article>")
            .with_page("https://jobs.example.com/about", 200, "<h1>About us</h1><article>Who we are</article>"),
    );

    let mut config = site_config("jobs", "https://jobs.example.com/");
    config.respect_robots_txt = true;
    config.robots_url = Some("https://jobs.example.com/robots.txt".to_string());
    config.forced_article_urls = vec!["https://jobs.example.com/about".to_string()];
    config.scoring.enabled = true;
    config.scoring.min_score = 5;
    config.scoring.positive_rules = vec![ScoreRule::terms(6, &["apply"])];

    let index = Arc::new(MemoryIndex::new());
    let summary = ScrapingCoordinator::new(config, transport.clone(), index.clone())
        .unwrap()
        .run_site()
        .await
        .unwrap();

    // developer + closed from discovery, about from the forced list
    assert_eq!(summary.urls_collected, 3);
    assert_eq!(summary.teasers_parsed, 2);

    let ids: Vec<_> = index.documents("jobs").into_iter().map(|d| d.id).collect();
    assert_eq!(
        ids,
        vec!["https://jobs.example.com/about", "https://jobs.example.com/jobs/developer"]
    );

    let requested = transport.requested();
    assert!(!requested.iter().any(|u| u.contains("/private/")));
    assert!(!requested.iter().any(|u| u.ends_with(".pdf")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_seed_reports_collect_stage() {
    let transport = Arc::new(SiteTransport::default());
    let index = Arc::new(MemoryIndex::new());
    let result = ScrapingCoordinator::new(site_config("news", START), transport.clone(), index)
        .unwrap()
        .run_site()
        .await;

    match result {
        Err(SiteRunError::StageFailed { site_id, stage }) => {
            assert_eq!(site_id, "news");
            assert_eq!(stage, Stage::Collect);
        }
        other => panic!("expected collect failure, got {:?}", other.map(|s| s.failed_stage)),
    }
    assert_eq!(transport.requested(), vec![START.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sites_do_not_share_throttle() {
    let a = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, &start_page())
            .with_page(ARTICLE, 200, "<h1>A</h1>"),
    );
    let b = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, &start_page())
            .with_page(ARTICLE, 200, "<h1>B</h1>"),
    );
    let index = Arc::new(MemoryIndex::new());
    let site_a = ScrapingCoordinator::new(site_config("site-a", START), a.clone(), index.clone()).unwrap();
    let site_b = ScrapingCoordinator::new(site_config("site-b", START), b.clone(), index.clone()).unwrap();

    let began = Instant::now();
    let (ra, rb) = tokio::join!(site_a.run_site(), site_b.run_site());
    ra.unwrap();
    rb.unwrap();

    // Each run waits one throttle interval of its own; sharing would need two
    assert!(began.elapsed() < Duration::from_millis(400));
    assert_eq!(index.documents("site-a")[0].title, "A");
    assert_eq!(index.documents("site-b")[0].title, "B");
}

#[tokio::test(start_paused = true)]
async fn test_json_lines_index_output() {
    let transport = Arc::new(
        SiteTransport::default()
            .with_page(START, 200, &start_page())
            .with_page(ARTICLE, 200, "<h1>Fish &amp; <em>Chips</em></h1>"),
    );
    let index = Arc::new(JsonLinesIndex::new(Vec::new()));
    ScrapingCoordinator::new(site_config("news", START), transport, index.clone())
        .unwrap()
        .run_site()
        .await
        .unwrap();

    let index = Arc::try_unwrap(index).ok().expect("coordinator dropped");
    let output = String::from_utf8(index.into_inner()).unwrap();
    let doc: IndexDocument = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(doc.title, "Fish & Chips");
    assert_eq!(doc.sp_objecttype, "news");
}

#[test]
fn test_site_config_loaded_by_key() {
    let dir = TempDir::new().unwrap();
    let mut file = std::fs::File::create(dir.path().join("news.toml")).unwrap();
    writeln!(
        file,
        r##"
site_id = "ignored"
max_teaser = 25
link_section_selector = "#content"
allow_prefixes = ["https://news.example.com/articles"]

[[start_points]]
url = "https://news.example.com/"
extraction_depth = 1

[request]
throttle_delay_ms = 500

[extraction.title]
css_selectors = ["h1.headline"]

[scoring]
enabled = true
min_score = 3

[[scoring.positive_rules]]
score = 3
match_any_terms = ["breaking"]
"##
    )
    .unwrap();

    let config = CrawlerConfig::for_site(dir.path(), "news").unwrap();
    assert_eq!(config.site_id, "news");
    assert_eq!(config.max_teaser, 25);
    assert_eq!(config.start_points[0].extraction_depth, 1);
    assert_eq!(config.request.throttle_delay_ms, 500);
    assert_eq!(config.extraction.title.css_selectors, vec!["h1.headline"]);
    assert_eq!(config.scoring.positive_rules.len(), 1);

    assert!(CrawlerConfig::for_site(dir.path(), "missing").is_err());
}
