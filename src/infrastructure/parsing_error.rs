//! Extraction error types
//!
//! Most of these never leave the extraction strategies: a failing card is
//! logged and skipped, a failing page becomes a transient outcome.

use thiserror::Error;

use crate::infrastructure::browser::BrowserError;

#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    #[error("Required field '{field}' not found")]
    RequiredFieldMissing {
        field: String,
        context: Option<String>,
    },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },

    #[error("Extraction of {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ExtractionError {
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.map(str::to_string),
        }
    }

    /// Whether the same call could succeed on a later run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequiredFieldMissing { .. } | Self::UrlResolutionFailed { .. } => false,
            Self::Timeout { .. } => true,
            Self::Browser(e) => !e.is_invalid_hint(),
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
