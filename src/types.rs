//! Core types flowing through a crawl run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A traversal root and its depth bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPoint {
    pub url: String,
    /// Maximum link depth followed from this root (0 = only the root page)
    #[serde(default)]
    pub extraction_depth: usize,
}

impl StartPoint {
    pub fn new(url: impl Into<String>, extraction_depth: usize) -> Self {
        Self {
            url: url.into(),
            extraction_depth,
        }
    }
}

/// Downloaded HTML for one URL. Dropped after parsing.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// Teaser extracted from a page, before sanitization
#[derive(Debug, Clone, PartialEq)]
pub struct TeaserCandidate {
    pub url: String,
    pub title: String,
    pub intro_text: Option<String>,
    pub datetime: Option<DateTime<Utc>>,
}

/// Cleaned teaser handed to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeaserRecord {
    pub url: String,
    pub title: String,
    pub intro_text: Option<String>,
    /// Opaque date string; interpreted by the index
    pub date: Option<String>,
}
