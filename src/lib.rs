//! TeaserCrawl: polite shallow crawler publishing page teasers to a search index
//!
//! Each site-run discovers article URLs from configured start points,
//! fetches them with per-host throttling and retries, extracts a title,
//! intro and date from each page, filters by relevance score, and hands the
//! cleaned batch to a [`index::TeaserIndex`].

pub mod config;
pub mod index;
pub mod scraping;
pub mod types;

pub use config::CrawlerConfig;
pub use types::*;
