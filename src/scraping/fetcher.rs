//! Page fetcher
//!
//! Downloads HTML for a batch of URLs through the request executor. A
//! batch is fetched concurrently, bounded by the per-host concurrency;
//! spacing between requests to one host is still enforced by the
//! executor's shared throttle.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error};

use super::executor::RequestExecutor;
use crate::types::FetchedPage;

/// Fetch statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub requested: usize,
    pub fetched: usize,
    pub no_response: usize,
    pub non_success: usize,
    pub body_errors: usize,
}

enum FetchOutcome {
    Page(FetchedPage),
    NoResponse,
    NonSuccess,
    BodyError,
}

/// Fetcher for one site-run
pub struct Fetcher {
    executor: Arc<RequestExecutor>,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(executor: Arc<RequestExecutor>, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch `urls`, returning one page per successful 2xx download.
    ///
    /// Output order follows completion, not input order.
    pub async fn fetch_urls(&self, urls: &[String]) -> (Vec<FetchedPage>, FetchStats) {
        let mut stats = FetchStats {
            requested: urls.len(),
            ..Default::default()
        };

        let outcomes: Vec<FetchOutcome> = stream::iter(urls.iter().cloned())
            .map(|url| self.fetch_one(url))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut pages = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Page(page) => {
                    stats.fetched += 1;
                    pages.push(page);
                }
                FetchOutcome::NoResponse => stats.no_response += 1,
                FetchOutcome::NonSuccess => stats.non_success += 1,
                FetchOutcome::BodyError => stats.body_errors += 1,
            }
        }

        (pages, stats)
    }

    async fn fetch_one(&self, url: String) -> FetchOutcome {
        let Some(response) = self.executor.request(&url).await else {
            return FetchOutcome::NoResponse;
        };

        // Non-2xx was already logged by the executor
        if !response.is_success() {
            debug!(url = %url, status = response.status, "Dropping non-success response");
            return FetchOutcome::NonSuccess;
        }

        match response.into_text() {
            Ok(html) => FetchOutcome::Page(FetchedPage { url, html }),
            Err(e) => {
                error!(url = %url, error = %e, "Failed to read page body");
                FetchOutcome::BodyError
            }
        }
    }
}
