//! Parser types

use thiserror::Error;

/// Pages larger than this are skipped to bound memory
pub const MAX_HTML_BYTES: usize = 2_000_000;

/// Errors during teaser extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTML too large: {0} bytes")]
    TooLarge(usize),
    #[error("Invalid {field} selector '{selector}': {message}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        message: String,
    },
}

/// Why a page produced no teaser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyHtml,
    MissingTitle,
    MissingIntro,
    MissingDatetime,
    NotRelevant,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyHtml => "empty html",
            Self::MissingTitle => "missing title",
            Self::MissingIntro => "missing intro text",
            Self::MissingDatetime => "missing or unparsable datetime",
            Self::NotRelevant => "below relevance threshold",
        }
    }
}
