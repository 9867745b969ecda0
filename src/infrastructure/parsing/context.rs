//! Per-target state shared by the extraction strategies

use url::Url;

use super::price::PriceBounds;
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};

#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// The target being scraped; single-item records use it as their url
    pub target_url: String,

    /// Scheme and host of the target, for resolving relative links
    pub origin: Url,

    pub bounds: PriceBounds,

    /// Characters of page text the generic strategy scans
    pub text_scan_limit: usize,

    /// Name used when no title selector matches
    pub fallback_name: String,
}

impl ExtractionContext {
    pub fn new(target_url: &str, bounds: PriceBounds) -> ExtractionResult<Self> {
        let parsed = Url::parse(target_url).map_err(|e| ExtractionError::UrlResolutionFailed {
            url: target_url.to_string(),
            reason: e.to_string(),
            base_url: None,
        })?;
        let mut origin = parsed;
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(Self {
            target_url: target_url.to_string(),
            origin,
            bounds,
            text_scan_limit: crate::infrastructure::config::defaults::TEXT_SCAN_LIMIT,
            fallback_name: "Unnamed product".to_string(),
        })
    }

    #[must_use]
    pub fn with_text_scan_limit(mut self, limit: usize) -> Self {
        self.text_scan_limit = limit;
        self
    }

    #[must_use]
    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self
    }

    /// Absolute form of a link found on the page.
    pub fn resolve_url(&self, href: &str) -> ExtractionResult<String> {
        let href = href.trim();
        if href.is_empty() {
            return Err(ExtractionError::required_field_missing("href", Some("empty link")));
        }

        self.origin
            .join(href)
            .map(String::from)
            .map_err(|e| ExtractionError::UrlResolutionFailed {
                url: href.to_string(),
                reason: e.to_string(),
                base_url: Some(self.origin.to_string()),
            })
    }
}
