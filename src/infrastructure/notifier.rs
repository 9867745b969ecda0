//! Outbound notifications and inbound commands
//!
//! Both directions are best effort: a failed send is logged by the caller and
//! never retried, and a failed poll just means no new targets this cycle.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::InboundCommand;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected the call: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, message: &str) -> TransportResult<()>;

    async fn send_text_with_image(&self, message: &str, image: &[u8]) -> TransportResult<()>;
}

#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Up to `limit` commands with a sequence greater than `after`, in order.
    async fn poll(&self, after: i64, limit: u32) -> TransportResult<Vec<InboundCommand>>;
}

/// Notifier used when no chat is configured: messages only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, message: &str) -> TransportResult<()> {
        info!(target: "price_watch::notification", "{}", message);
        Ok(())
    }

    async fn send_text_with_image(&self, message: &str, image: &[u8]) -> TransportResult<()> {
        info!(
            target: "price_watch::notification",
            "{} [image: {} bytes]",
            message,
            image.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        assert!(notifier.send_text("hello").await.is_ok());
        assert!(notifier.send_text_with_image("hello", &[1, 2, 3]).await.is_ok());
    }
}
