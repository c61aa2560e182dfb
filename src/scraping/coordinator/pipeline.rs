//! Per-chunk parse step and the processing hand-off

use std::sync::Arc;
use tracing::error;

use super::types::StageOutcome;
use crate::scraping::extractor::TeaserParser;
use crate::scraping::processor::sanitize_text;
use crate::types::{FetchedPage, TeaserCandidate, TeaserRecord};

/// Parse one fetched chunk on a blocking thread.
///
/// HTML parsing is CPU-bound, so it stays off the async workers. The pages
/// are consumed here and dropped once parsed.
pub(super) async fn parse_chunk(parser: Arc<TeaserParser>, pages: Vec<FetchedPage>) -> StageOutcome<TeaserCandidate> {
    match tokio::task::spawn_blocking(move || parser.extract_teasers(pages)).await {
        Ok(candidates) => StageOutcome::completed(candidates),
        Err(e) => {
            error!(stage = "parse", error = %e, "Parse task failed");
            StageOutcome::failed()
        }
    }
}

/// Run parsed candidates through the processor into `records`
pub(super) fn process_into(records: &mut Vec<TeaserRecord>, candidates: Vec<TeaserCandidate>) {
    records.extend(sanitize_text(candidates));
}
