//! Coordinator types: stage outcomes, run summary, and errors

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::index::{IndexError, IndexStatus};
use crate::scraping::collector::CollectError;
use crate::scraping::executor::RequestError;
use crate::scraping::extractor::ExtractError;

/// Pipeline stages of one site-run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Fetch,
    Parse,
    Process,
    Index,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Process => "process",
            Stage::Index => "index",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage: its items, and whether it failed outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome<T> {
    pub items: Vec<T>,
    pub failed: bool,
}

impl<T> StageOutcome<T> {
    pub fn completed(items: Vec<T>) -> Self {
        Self { items, failed: false }
    }

    pub fn failed() -> Self {
        Self {
            items: Vec::new(),
            failed: true,
        }
    }
}

/// What one site-run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub site_id: String,
    pub process_id: String,
    pub urls_collected: usize,
    pub pages_fetched: usize,
    pub teasers_parsed: usize,
    pub teasers_processed: usize,
    pub index_status: IndexStatus,
    /// First stage that failed, if any
    pub failed_stage: Option<Stage>,
}

impl RunSummary {
    pub(super) fn new(site_id: &str, process_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            process_id: process_id.to_string(),
            urls_collected: 0,
            pages_fetched: 0,
            teasers_parsed: 0,
            teasers_processed: 0,
            index_status: IndexStatus::default(),
            failed_stage: None,
        }
    }
}

/// Errors surfaced to whoever schedules site-runs
#[derive(Debug, Error)]
pub enum SiteRunError {
    #[error("Collector setup failed: {0}")]
    Collector(#[from] CollectError),
    #[error("Parser setup failed: {0}")]
    Parser(#[from] ExtractError),
    #[error("HTTP client setup failed: {0}")]
    Transport(#[from] RequestError),
    /// The run finished, but a stage failed and nothing new was indexed
    #[error("Site run '{site_id}' failed at stage {stage}")]
    StageFailed { site_id: String, stage: Stage },
    #[error("Indexing failed: {0}")]
    Index(#[from] IndexError),
}
