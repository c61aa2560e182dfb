//! Teaser crawl pipeline
//!
//! Key components:
//! - `UrlNormalizer`: URL canonicalization, allow/deny filtering, dedup
//! - `RobotsChecker`: robots.txt fetch, cache, and filtering
//! - `RequestExecutor`: per-host throttling with retry and backoff
//! - `UrlCollector`: breadth-first link discovery from start points
//! - `Fetcher`: concurrent HTML download for a batch of URLs
//! - `TeaserParser`: field extraction and relevance scoring
//! - `processor`: text sanitization of parsed teasers
//! - `ScrapingCoordinator`: sequences the stages of one site-run

pub mod collector;
pub mod coordinator;
pub mod executor;
pub mod extractor;
pub mod fetcher;
pub mod normalizer;
pub mod politeness;
pub mod processor;

pub use collector::{CollectError, UrlCollector};
pub use coordinator::{RunSummary, ScrapingCoordinator, SiteRunError, Stage, StageOutcome};
pub use executor::{HttpResponse, HttpTransport, RequestError, RequestExecutor, ReqwestTransport};
pub use extractor::{RelevanceEvaluator, TeaserParser};
pub use fetcher::{FetchStats, Fetcher};
pub use normalizer::UrlNormalizer;
pub use politeness::{RobotsChecker, RobotsPolicy};
pub use processor::sanitize_text;
