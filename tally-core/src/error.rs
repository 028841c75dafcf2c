//! Fatal error type for the extraction pipeline.
//!
//! Only conditions that stop a document from being processed at all live
//! here. Everything recoverable (a page that fails OCR, a row that cannot
//! be parsed, a balance that does not add up) becomes a
//! [`Finding`](crate::Finding) on the result instead.

use thiserror::Error;

/// Result alias used across the tally crates.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Unknown kind, or bytes whose signature does not match the declared kind.
    #[error("unsupported document: {reason}")]
    UnsupportedDocument { reason: String },

    /// The PDF container could not be opened, so no page can be enumerated.
    #[error("unreadable PDF: {reason}")]
    UnreadablePdf { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Anything unexpected inside the pipeline.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ExtractError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedDocument {
            reason: reason.into(),
        }
    }

    /// True for the errors a caller should report as "wrong input" rather
    /// than "something broke".
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDocument { .. } | Self::UnreadablePdf { .. }
        )
    }
}
