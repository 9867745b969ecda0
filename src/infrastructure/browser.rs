//! Browser automation boundary
//!
//! Extraction code only ever talks to [`BrowserDriver`]. Handles are opaque
//! ids handed out by the driver; they are cheap to copy and carry no borrow
//! of the underlying document.

pub mod page_source;
pub mod snapshot_browser;

pub use page_source::{HttpPageSource, PageSource, StaticPageSource};
pub use snapshot_browser::SnapshotBrowser;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub page: PageHandle,
    pub node: usize,
}

#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("Navigation to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Invalid structural hint '{hint}': {reason}")]
    InvalidHint { hint: String, reason: String },

    #[error("Unknown page or element handle")]
    StaleHandle,

    #[error("Operation not supported by this driver: {0}")]
    Unsupported(&'static str),

    #[error("Network error: {0}")]
    Network(String),
}

impl BrowserError {
    /// A bad selector only rules out that selector; callers move on to the next fallback.
    pub fn is_invalid_hint(&self) -> bool {
        matches!(self, Self::InvalidHint { .. })
    }
}

impl From<reqwest::Error> for BrowserError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Capabilities the extraction engine needs from a rendered page.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open `url` and wait for it to render, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> BrowserResult<PageHandle>;

    /// Elements matching `hint` anywhere in the page, in document order.
    async fn query(&self, page: PageHandle, hint: &str) -> BrowserResult<Vec<ElementHandle>>;

    /// Elements matching `hint` below `element`, in document order.
    async fn query_within(
        &self,
        element: ElementHandle,
        hint: &str,
    ) -> BrowserResult<Vec<ElementHandle>>;

    async fn read_text(&self, element: ElementHandle) -> BrowserResult<String>;

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>>;

    async fn scroll_to_bottom(&self, page: PageHandle) -> BrowserResult<()>;

    async fn current_height(&self, page: PageHandle) -> BrowserResult<u64>;

    async fn capture_image(&self, page: PageHandle) -> BrowserResult<Vec<u8>>;

    /// Release the page. Drivers without per-page resources can ignore this.
    async fn close(&self, _page: PageHandle) -> BrowserResult<()> {
        Ok(())
    }
}
