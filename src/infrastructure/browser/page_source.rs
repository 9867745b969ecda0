//! Where page markup comes from
//!
//! [`HttpPageSource`] fetches pages directly or through a Browserless-style
//! rendering service; [`StaticPageSource`] serves canned markup for tests and
//! offline runs.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{BrowserError, BrowserResult};
use crate::infrastructure::config::BrowserConfig;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Rendered markup for `url`.
    async fn fetch_html(&self, url: &str) -> BrowserResult<String>;

    /// Viewport capture of `url`.
    async fn screenshot(&self, _url: &str) -> BrowserResult<Vec<u8>> {
        Err(BrowserError::Unsupported("screenshot"))
    }
}

/// Rate limited HTTP fetcher.
pub struct HttpPageSource {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    render_endpoint: Option<String>,
    render_token: Option<String>,
}

impl HttpPageSource {
    pub fn new(config: &BrowserConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid Accept-Language")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.navigation_timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            render_endpoint: config
                .render_endpoint
                .as_ref()
                .map(|endpoint| endpoint.trim_end_matches('/').to_string())
                .filter(|endpoint| !endpoint.is_empty()),
            render_token: config.render_token.clone(),
        })
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
    }

    fn render_url(&self, endpoint: &str, action: &str) -> String {
        match &self.render_token {
            Some(token) => format!("{endpoint}/{action}?token={token}"),
            None => format!("{endpoint}/{action}"),
        }
    }

    async fn fetch_direct(&self, url: &str) -> BrowserResult<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, Self::random_user_agent())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_rendered(&self, endpoint: &str, url: &str) -> BrowserResult<String> {
        let body = json!({
            "url": url,
            "gotoOptions": { "waitUntil": "networkidle2" },
            "userAgent": Self::random_user_agent(),
        });
        let response = self
            .client
            .post(self.render_url(endpoint, "content"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("render service returned HTTP {}", response.status()),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_html(&self, url: &str) -> BrowserResult<String> {
        self.rate_limiter.until_ready().await;
        info!("Fetching page: {}", url);

        let html = match &self.render_endpoint {
            Some(endpoint) => self.fetch_rendered(endpoint, url).await?,
            None => self.fetch_direct(url).await?,
        };

        debug!("Fetched {} ({} bytes)", url, html.len());
        Ok(html)
    }

    async fn screenshot(&self, url: &str) -> BrowserResult<Vec<u8>> {
        let Some(endpoint) = &self.render_endpoint else {
            return Err(BrowserError::Unsupported("screenshot without a render endpoint"));
        };

        self.rate_limiter.until_ready().await;
        let body = json!({
            "url": url,
            "options": { "type": "png", "fullPage": false },
        });
        let response = self
            .client
            .post(self.render_url(endpoint, "screenshot"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("screenshot returned HTTP {}", response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// In-memory pages keyed by url. Unknown urls fail like an unreachable host.
#[derive(Default)]
pub struct StaticPageSource {
    pages: RwLock<HashMap<String, String>>,
    screenshots: RwLock<HashMap<String, Vec<u8>>>,
}

impl StaticPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the markup served for `url`.
    pub async fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.write().await.insert(url.into(), html.into());
    }

    pub async fn set_screenshot(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.screenshots.write().await.insert(url.into(), bytes);
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn fetch_html(&self, url: &str) -> BrowserResult<String> {
        self.pages
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Navigation {
                url: url.to_string(),
                reason: "no page registered".to_string(),
            })
    }

    async fn screenshot(&self, url: &str) -> BrowserResult<Vec<u8>> {
        self.screenshots
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or(BrowserError::Unsupported("no screenshot registered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_serves_registered_pages() {
        let source = StaticPageSource::new();
        source.set_page("https://shop.example/a", "<p>a</p>").await;

        assert_eq!(source.fetch_html("https://shop.example/a").await.unwrap(), "<p>a</p>");
        assert!(matches!(
            source.fetch_html("https://shop.example/b").await,
            Err(BrowserError::Navigation { .. })
        ));
        assert!(source.screenshot("https://shop.example/a").await.is_err());
    }

    #[test]
    fn test_http_source_creation() {
        let source = HttpPageSource::new(&BrowserConfig::default());
        assert!(source.is_ok());
    }

    #[test]
    fn test_render_url_carries_token() {
        let config = BrowserConfig {
            render_endpoint: Some("https://render.example/".to_string()),
            render_token: Some("secret".to_string()),
            ..BrowserConfig::default()
        };
        let source = HttpPageSource::new(&config).unwrap();
        let endpoint = source.render_endpoint.clone().unwrap();

        assert_eq!(
            source.render_url(&endpoint, "content"),
            "https://render.example/content?token=secret"
        );
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let config = BrowserConfig {
            max_requests_per_second: 0,
            ..BrowserConfig::default()
        };
        assert!(HttpPageSource::new(&config).is_err());
    }
}
