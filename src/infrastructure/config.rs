//! Configuration infrastructure
//!
//! One JSON file holds every setting. Missing sections and fields fall back
//! to the constants in [`defaults`], so an empty `{}` is a valid config.
//!
//! Lookup order for the file:
//! 1. `PRICE_WATCH_CONFIG` environment variable
//! 2. `./price-watch.json`
//! 3. `<user config dir>/price-watch/config.json`
//!
//! Telegram credentials can also come from `TELEGRAM_TOKEN` and
//! `TELEGRAM_CHAT_ID`, which win over the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::domain::PricePolicy;
use crate::infrastructure::parsing::config::{SiteProfile, builtin_profiles};
use crate::infrastructure::parsing::price::PriceBounds;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub tracking: TrackingConfig,
    pub browser: BrowserConfig,
    pub telegram: TelegramConfig,
    /// Site profiles in match order
    pub sites: SitesConfig,
    pub logging: LoggingConfig,
}

/// Locations of the persisted state files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Newline-delimited target urls
    pub targets_path: PathBuf,

    /// JSON price ledger
    pub ledger_path: PathBuf,

    /// Last processed inbound command sequence
    pub cursor_path: PathBuf,
}

/// Change detection and extraction limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum floor-rounded drop percentage that triggers an alert
    pub discount_threshold_percent: u32,

    /// Scanned prices must be strictly above this
    pub min_sane_price: f64,

    /// Scanned prices must be strictly below this
    pub max_sane_price: f64,

    /// Characters of page text scanned by the generic strategy
    pub text_scan_limit: usize,

    /// Targets containing any of these substrings are skipped
    pub skip_patterns: Vec<String>,
}

/// Page loading, pacing and rendering service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub navigation_timeout_seconds: u64,

    /// Upper bound for navigating and extracting one target
    pub target_timeout_seconds: u64,

    pub max_scroll_iterations: u32,
    pub scroll_settle_ms: u64,

    /// Random pause after navigation and between targets, in milliseconds
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,

    pub max_requests_per_second: u32,

    /// Base url of a Browserless-style rendering service
    pub render_endpoint: Option<String>,
    pub render_token: Option<String>,

    pub accept_language: String,
}

/// Telegram bot settings. Both token and chat id are needed to talk to Telegram.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,

    /// Chat that receives alerts and the only sender whose commands are honored
    pub chat_id: Option<String>,

    /// Maximum updates fetched per cycle
    pub poll_limit: u32,

    pub request_timeout_seconds: u64,
}

/// Ordered site profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SitesConfig(pub Vec<SiteProfile>);

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    pub console_output: bool,
    pub file_output: bool,

    /// Defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files are deleted on startup)
    pub max_files: u32,

    /// Per-target level overrides, e.g. "reqwest": "warn"
    pub module_filters: HashMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            targets_path: PathBuf::from(defaults::TARGETS_FILE),
            ledger_path: PathBuf::from(defaults::LEDGER_FILE),
            cursor_path: PathBuf::from(defaults::CURSOR_FILE),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            discount_threshold_percent: defaults::DISCOUNT_THRESHOLD_PERCENT,
            min_sane_price: defaults::MIN_SANE_PRICE,
            max_sane_price: defaults::MAX_SANE_PRICE,
            text_scan_limit: defaults::TEXT_SCAN_LIMIT,
            skip_patterns: Vec::new(),
        }
    }
}

impl TrackingConfig {
    pub fn policy(&self) -> PricePolicy {
        PricePolicy {
            discount_threshold_percent: self.discount_threshold_percent,
        }
    }

    pub fn bounds(&self) -> PriceBounds {
        PriceBounds {
            min_exclusive: self.min_sane_price,
            max_exclusive: self.max_sane_price,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_seconds: defaults::NAVIGATION_TIMEOUT_SECONDS,
            target_timeout_seconds: defaults::TARGET_TIMEOUT_SECONDS,
            max_scroll_iterations: defaults::MAX_SCROLL_ITERATIONS,
            scroll_settle_ms: defaults::SCROLL_SETTLE_MS,
            pacing_min_ms: defaults::PACING_MIN_MS,
            pacing_max_ms: defaults::PACING_MAX_MS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            render_endpoint: None,
            render_token: None,
            accept_language: defaults::ACCEPT_LANGUAGE.to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_seconds)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    /// Browser settings with every pause set to zero, for tests and dry runs.
    pub fn without_pacing(mut self) -> Self {
        self.pacing_min_ms = 0;
        self.pacing_max_ms = 0;
        self.scroll_settle_ms = 0;
        self
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            poll_limit: defaults::POLL_LIMIT,
            request_timeout_seconds: defaults::TELEGRAM_TIMEOUT_SECONDS,
        }
    }
}

impl TelegramConfig {
    /// `(token, chat_id)` when both are set and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.bot_token.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let chat = self.chat_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((token, chat))
    }
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self(builtin_profiles())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters: HashMap::new(),
        }
    }
}

/// Configuration manager for locating and loading settings
pub struct ConfigManager {
    pub config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Pick the config file from the environment and the usual locations.
    pub fn new() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    fn resolve(env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = env(defaults::CONFIG_ENV_VAR).filter(|p| !p.trim().is_empty()) {
            return Self::with_path(path);
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::with_path(local);
        }

        let user = Self::get_config_dir()
            .ok()
            .map(|dir| dir.join(defaults::USER_CONFIG_FILE))
            .filter(|path| path.exists());
        Self { config_path: user }
    }

    /// Load the configuration and apply environment overrides.
    pub async fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config_path {
            Some(path) => Self::read_file(path).await?,
            None => {
                info!("No configuration file found, using defaults");
                AppConfig::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    async fn read_file(path: &Path) -> Result<AppConfig> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = serde_json::from_str::<AppConfig>(&content)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        info!("Loaded configuration from: {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", path);
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    /// Environment credentials take precedence over the file.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(token) = env(defaults::TOKEN_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = env(defaults::CHAT_ID_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            self.telegram.chat_id = Some(chat);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let tracking = &self.tracking;
        anyhow::ensure!(
            tracking.min_sane_price >= 0.0 && tracking.min_sane_price < tracking.max_sane_price,
            "tracking.min_sane_price must be non-negative and below max_sane_price"
        );
        anyhow::ensure!(
            self.browser.pacing_min_ms <= self.browser.pacing_max_ms,
            "browser.pacing_min_ms must not exceed pacing_max_ms"
        );
        anyhow::ensure!(
            self.browser.max_requests_per_second > 0,
            "browser.max_requests_per_second must be greater than 0"
        );
        for site in &self.sites.0 {
            anyhow::ensure!(
                !site.domain_pattern.trim().is_empty(),
                "site '{}' has an empty domain_pattern",
                site.name
            );
        }
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "price-watch";
    pub const CONFIG_ENV_VAR: &str = "PRICE_WATCH_CONFIG";
    pub const LOCAL_CONFIG_FILE: &str = "price-watch.json";
    pub const USER_CONFIG_FILE: &str = "config.json";
    pub const TOKEN_ENV_VAR: &str = "TELEGRAM_TOKEN";
    pub const CHAT_ID_ENV_VAR: &str = "TELEGRAM_CHAT_ID";

    pub const TARGETS_FILE: &str = "urls.txt";
    pub const LEDGER_FILE: &str = "prices.json";
    pub const CURSOR_FILE: &str = "telegram_cursor.txt";

    /// Drops below this percentage are recorded silently
    pub const DISCOUNT_THRESHOLD_PERCENT: u32 = 5;
    pub const MIN_SANE_PRICE: f64 = 10.0;
    pub const MAX_SANE_PRICE: f64 = 1_000_000.0;
    pub const TEXT_SCAN_LIMIT: usize = 20_000;

    pub const NAVIGATION_TIMEOUT_SECONDS: u64 = 90;
    pub const TARGET_TIMEOUT_SECONDS: u64 = 180;
    pub const MAX_SCROLL_ITERATIONS: u32 = 5;
    pub const SCROLL_SETTLE_MS: u64 = 1000;
    pub const PACING_MIN_MS: u64 = 3000;
    pub const PACING_MAX_MS: u64 = 7000;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 1;
    pub const ACCEPT_LANGUAGE: &str = "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7";

    pub const POLL_LIMIT: u32 = 100;
    pub const TELEGRAM_TIMEOUT_SECONDS: u64 = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_MAX_FILES: u32 = 5;
}
