//! Telegram Bot API adapter
//!
//! Sends alerts with `sendMessage` / `sendPhoto` and reads commands with
//! `getUpdates`. Telegram's `update_id` is the command sequence number, so
//! polling with `offset = cursor + 1` returns only unseen updates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::config::TelegramConfig;
use super::notifier::{CommandSource, Notifier, TransportError, TransportResult};
use crate::domain::InboundCommand;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram caps photo captions; longer alerts go out as plain text.
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

pub struct TelegramClient {
    client: Client,
    api_url: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(token: &str, chat_id: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create Telegram HTTP client")?;

        Ok(Self {
            client,
            api_url: format!("{API_BASE}/bot{token}"),
            chat_id: chat_id.to_string(),
        })
    }

    /// Client for the configured bot, or `None` when credentials are missing.
    pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Option<Self>> {
        let Some((token, chat_id)) = config.credentials() else {
            return Ok(None);
        };
        Self::new(
            token,
            chat_id,
            Duration::from_secs(config.request_timeout_seconds),
        )
        .map(Some)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_url)
    }

    async fn check<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> TransportResult<Option<T>> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("HTTP {status}: {e}")))?;

        if !body.ok {
            return Err(TransportError::Rejected(
                body.description.unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        Ok(body.result)
    }
}

/// Commands from a `getUpdates` payload. Updates without text still count
/// toward the cursor, so they come back with empty text.
fn commands_from_updates(updates: Vec<Update>) -> Vec<InboundCommand> {
    updates
        .into_iter()
        .map(|update| match update.message {
            Some(message) => InboundCommand::new(
                update.update_id,
                message.chat.id.to_string(),
                message.text.unwrap_or_default(),
            ),
            None => InboundCommand::new(update.update_id, String::new(), String::new()),
        })
        .collect()
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, message: &str) -> TransportResult<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "disable_web_page_preview": false,
            }))
            .send()
            .await?;
        Self::check::<serde_json::Value>(response).await?;
        debug!("Telegram message sent ({} chars)", message.chars().count());
        Ok(())
    }

    async fn send_text_with_image(&self, message: &str, image: &[u8]) -> TransportResult<()> {
        if message.chars().count() > MAX_CAPTION_CHARS {
            return self.send_text(message).await;
        }

        let photo = multipart::Part::bytes(image.to_vec())
            .file_name("capture.png")
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", message.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        Self::check::<serde_json::Value>(response).await?;
        debug!("Telegram photo sent ({} bytes)", image.len());
        Ok(())
    }
}

/// First update id still unconfirmed after `after`.
const fn next_offset(after: i64) -> i64 {
    after.saturating_add(1)
}

#[async_trait]
impl CommandSource for TelegramClient {
    async fn poll(&self, after: i64, limit: u32) -> TransportResult<Vec<InboundCommand>> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", next_offset(after).to_string()),
                ("limit", limit.to_string()),
                ("timeout", "0".to_string()),
            ])
            .send()
            .await?;

        let updates = Self::check::<Vec<Update>>(response).await?.unwrap_or_default();
        let mut commands = commands_from_updates(updates);
        // getUpdates may hand back an update we already confirmed if the offset raced
        commands.retain(|command| command.sequence > after);
        debug!("Polled {} Telegram update(s) after {}", commands.len(), after);
        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"chat": {"id": 42}, "text": "/ekle https://www.gsstore.org/x"}},
                {"update_id": 11, "message": {"chat": {"id": 7}, "sticker": {}}},
                {"update_id": 12, "edited_message": {"chat": {"id": 42}, "text": "/liste"}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(response.ok);

        let commands = commands_from_updates(response.result.unwrap());
        assert_eq!(
            commands,
            vec![
                InboundCommand::new(10, "42", "/ekle https://www.gsstore.org/x"),
                InboundCommand::new(11, "7", ""),
                InboundCommand::new(12, "", ""),
            ]
        );
    }

    #[test]
    fn test_next_offset_saturates() {
        assert_eq!(next_offset(0), 1);
        assert_eq!(next_offset(41), 42);
        assert_eq!(next_offset(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_error_response_shape() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();

        assert!(!response.ok);
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(TelegramClient::from_config(&TelegramConfig::default()).unwrap().is_none());

        let config = TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            ..TelegramConfig::default()
        };
        let client = TelegramClient::from_config(&config).unwrap().unwrap();
        assert_eq!(
            client.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }
}
