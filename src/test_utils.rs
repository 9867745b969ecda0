//! Test utilities for price-watch
//!
//! In-memory stand-ins for the network collaborators so extraction and full
//! cycles can be exercised without a browser, a chat bot or the internet.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::InboundCommand;
use crate::infrastructure::browser::{BrowserDriver, PageHandle, SnapshotBrowser, StaticPageSource};
use crate::infrastructure::notifier::{CommandSource, Notifier, TransportError, TransportResult};

/// Browser holding a single page of `html` served at `url`, already opened.
///
/// Panics if the page cannot be opened, which only happens on a broken fixture.
pub async fn open_fixture(url: &str, html: &str) -> (SnapshotBrowser, PageHandle) {
    let source = StaticPageSource::new();
    source.set_page(url, html).await;
    let browser = SnapshotBrowser::new(Arc::new(source));
    let page = browser
        .navigate(url, Duration::from_secs(5))
        .await
        .unwrap_or_else(|e| panic!("fixture {url} did not open: {e}"));
    (browser, page)
}

/// A message as the recording notifier received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub text: String,
    /// Size of the attached capture, if any
    pub image_bytes: Option<usize>,
}

/// Notifier that keeps everything it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call records the message and then reports a rejection.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    async fn record(&self, text: &str, image_bytes: Option<usize>) -> TransportResult<()> {
        self.sent.lock().await.push(SentMessage {
            text: text.to_string(),
            image_bytes,
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("recording notifier set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, message: &str) -> TransportResult<()> {
        self.record(message, None).await
    }

    async fn send_text_with_image(&self, message: &str, image: &[u8]) -> TransportResult<()> {
        self.record(message, Some(image.len())).await
    }
}

/// Command source replaying a fixed inbox, the way a chat API would.
#[derive(Debug, Default)]
pub struct ScriptedCommandSource {
    inbox: Mutex<Vec<InboundCommand>>,
    unavailable: AtomicBool,
}

impl ScriptedCommandSource {
    pub fn new(commands: Vec<InboundCommand>) -> Self {
        Self {
            inbox: Mutex::new(commands),
            unavailable: AtomicBool::new(false),
        }
    }

    pub async fn push(&self, command: InboundCommand) {
        self.inbox.lock().await.push(command);
    }

    /// Make every following poll fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandSource for ScriptedCommandSource {
    async fn poll(&self, after: i64, limit: u32) -> TransportResult<Vec<InboundCommand>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidResponse("inbox unavailable".to_string()));
        }
        let mut commands: Vec<InboundCommand> = self
            .inbox
            .lock()
            .await
            .iter()
            .filter(|c| c.sequence > after)
            .cloned()
            .collect();
        commands.sort_by_key(|c| c.sequence);
        commands.truncate(limit as usize);
        Ok(commands)
    }
}
