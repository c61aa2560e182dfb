//! Indexing boundary
//!
//! The crawl hands one finished batch of teaser records per site-run to a
//! [`TeaserIndex`]. An index turns each record into an [`IndexDocument`],
//! commits the batch, and only when every record was accepted removes the
//! site's documents left over from earlier crawl processes.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::TeaserRecord;

/// Errors that prevent an index from accepting a batch at all
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Document shape stored in the search index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_date: Option<String>,
    pub url: String,
    pub sp_objecttype: String,
    pub crawl_process_id: String,
    pub sp_source: Vec<String>,
}

impl IndexDocument {
    /// Build the document for `record`; the URL doubles as the id
    pub fn from_record(site_id: &str, process_id: &str, record: &TeaserRecord) -> Self {
        Self {
            id: record.url.clone(),
            title: record.title.clone(),
            sp_intro: record.intro_text.clone(),
            sp_date: record.date.clone(),
            url: record.url.clone(),
            sp_objecttype: site_id.to_string(),
            crawl_process_id: process_id.to_string(),
            sp_source: vec![site_id.to_string()],
        }
    }
}

/// Outcome of one indexing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    /// Documents accepted
    pub submitted: usize,
    /// Documents that failed to submit
    pub errors: usize,
    /// Stale documents removed after a clean pass
    pub deleted_stale: usize,
}

impl IndexStatus {
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Document index client for finished teaser batches
#[async_trait]
pub trait TeaserIndex: Send + Sync {
    /// Submit `records` for `site_id` under `process_id`.
    ///
    /// Per-document failures are counted in the returned status; an `Err`
    /// means the batch could not be handled at all.
    async fn index(
        &self,
        site_id: &str,
        process_id: &str,
        records: Vec<TeaserRecord>,
    ) -> Result<IndexStatus, IndexError>;
}

/// In-process index keeping documents per site
#[derive(Debug, Default)]
pub struct MemoryIndex {
    sites: Mutex<HashMap<String, BTreeMap<String, IndexDocument>>>,
    rejected_urls: HashSet<String>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index that refuses documents for `urls`, counting each as an error
    pub fn rejecting<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sites: Mutex::default(),
            rejected_urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Documents currently stored for `site_id`, ordered by id
    pub fn documents(&self, site_id: &str) -> Vec<IndexDocument> {
        self.sites
            .lock()
            .get(site_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed a document directly, as if left by an earlier crawl
    pub fn insert(&self, document: IndexDocument) {
        let site = document.sp_objecttype.clone();
        self.sites
            .lock()
            .entry(site)
            .or_default()
            .insert(document.id.clone(), document);
    }
}

#[async_trait]
impl TeaserIndex for MemoryIndex {
    async fn index(
        &self,
        site_id: &str,
        process_id: &str,
        records: Vec<TeaserRecord>,
    ) -> Result<IndexStatus, IndexError> {
        let mut status = IndexStatus::default();
        let mut sites = self.sites.lock();
        let docs = sites.entry(site_id.to_string()).or_default();

        for record in &records {
            if self.rejected_urls.contains(&record.url) {
                warn!(url = %record.url, site = site_id, "Index rejected document");
                status.errors += 1;
                continue;
            }
            let document = IndexDocument::from_record(site_id, process_id, record);
            docs.insert(document.id.clone(), document);
            status.submitted += 1;
        }

        // Partial passes never delete: the missing documents may still be good
        if status.is_clean() {
            let before = docs.len();
            docs.retain(|_, doc| doc.crawl_process_id == process_id);
            status.deleted_stale = before - docs.len();
        }

        debug!(site = site_id, process_id, ?status, "Memory index pass finished");
        Ok(status)
    }
}

/// Index writing one JSON document per line, e.g. to stdout or a file.
///
/// A stream cannot delete earlier output, so stale cleanup is left to the
/// consumer; `crawl_process_id` on every line makes that possible.
pub struct JsonLinesIndex<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesIndex<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> TeaserIndex for JsonLinesIndex<W> {
    async fn index(
        &self,
        site_id: &str,
        process_id: &str,
        records: Vec<TeaserRecord>,
    ) -> Result<IndexStatus, IndexError> {
        let mut status = IndexStatus::default();
        let mut writer = self.writer.lock();

        for record in &records {
            let document = IndexDocument::from_record(site_id, process_id, record);
            match serde_json::to_string(&document) {
                Ok(line) => {
                    writeln!(writer, "{}", line)?;
                    status.submitted += 1;
                }
                Err(e) => {
                    warn!(url = %record.url, error = %e, "Failed to serialize document");
                    status.errors += 1;
                }
            }
        }
        writer.flush()?;

        Ok(status)
    }
}
