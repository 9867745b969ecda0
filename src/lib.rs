//! Price Watch - scheduled e-commerce price tracking
//!
//! Each run pulls new tracking targets from the chat inbox, re-extracts every
//! target's products, diffs them into the persisted price ledger and sends an
//! alert for every drop that reaches the configured discount threshold.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::application::{CommandIntake, CycleReport, PriceTracker, TrackerSettings};
use crate::infrastructure::browser::{BrowserDriver, HttpPageSource, SnapshotBrowser};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::notifier::{CommandSource, LogNotifier, Notifier};
use crate::infrastructure::parsing::{ScrollPolicy, SiteDispatcher};
use crate::infrastructure::storage::{CursorStore, LedgerStore, TargetStore};
use crate::infrastructure::telegram::TelegramClient;

/// The outside world a run talks to.
pub struct Collaborators {
    pub browser: Arc<dyn BrowserDriver>,
    pub notifier: Arc<dyn Notifier>,
    /// `None` disables command intake
    pub commands: Option<Arc<dyn CommandSource>>,
}

impl Collaborators {
    /// Live adapters: fetched pages plus Telegram when credentials are set,
    /// otherwise alerts only reach the log.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = HttpPageSource::new(&config.browser).context("Failed to build page source")?;
        let browser: Arc<dyn BrowserDriver> = Arc::new(SnapshotBrowser::new(Arc::new(source)));

        match TelegramClient::from_config(&config.telegram)? {
            Some(client) => {
                let client = Arc::new(client);
                Ok(Self {
                    browser,
                    notifier: client.clone(),
                    commands: Some(client),
                })
            }
            None => {
                info!("Telegram credentials not set, notifications go to the log and intake is off");
                Ok(Self {
                    browser,
                    notifier: Arc::new(LogNotifier),
                    commands: None,
                })
            }
        }
    }
}

/// Run one full cycle against the live adapters.
pub async fn run_once(config: &AppConfig) -> Result<CycleReport> {
    let collaborators = Collaborators::from_config(config)?;
    run_with(config, collaborators, Utc::now()).await
}

/// Run one full cycle with the given collaborators, stamping changes with `now`.
///
/// Fails only when the target list or ledger cannot be loaded, or the ledger
/// cannot be saved. Everything else is logged and counted in the report.
pub async fn run_with(
    config: &AppConfig,
    collaborators: Collaborators,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    let storage = &config.storage;
    let target_store = TargetStore::new(&storage.targets_path);
    let ledger_store = LedgerStore::new(&storage.ledger_path);

    let mut targets = target_store
        .load_or_initialize()
        .await
        .context("Failed to load target list")?;
    // A broken ledger must fail the run before any inbox command is consumed.
    let mut ledger = ledger_store.load().await.context("Failed to load price ledger")?;

    let mut targets_added = 0;
    match (&collaborators.commands, config.telegram.chat_id.as_deref().map(str::trim)) {
        (Some(source), Some(chat_id)) if !chat_id.is_empty() => {
            let intake = CommandIntake::new(
                Arc::clone(source),
                Arc::clone(&collaborators.notifier),
                target_store.clone(),
                CursorStore::new(&storage.cursor_path),
                chat_id,
                config.telegram.poll_limit,
            );
            targets_added = intake.run(&mut targets).await.added.len();
        }
        (Some(_), _) => warn!("No authorized chat configured, skipping command intake"),
        (None, _) => {}
    }

    let scroll = ScrollPolicy {
        max_iterations: config.browser.max_scroll_iterations,
        settle: config.browser.scroll_settle(),
    };
    let dispatcher =
        SiteDispatcher::from_profiles(&config.sites.0, &config.tracking.skip_patterns, scroll);
    let tracker = PriceTracker::new(
        collaborators.browser,
        dispatcher,
        collaborators.notifier,
        TrackerSettings::from_config(config),
    );

    let mut report = tracker.run_cycle(&targets, &mut ledger, now).await;
    report.targets_added = targets_added;

    ledger_store
        .save(&ledger)
        .await
        .context("Failed to save price ledger")?;
    info!("Ledger saved with {} product(s) to {}", ledger.len(), ledger_store.path().display());

    info!(
        "Cycle finished: {} processed, {} failed, {} skipped, {} observed, {} new, {} drop alert(s), {} target(s) added",
        report.targets_processed,
        report.targets_failed,
        report.targets_skipped,
        report.records_observed,
        report.records_new,
        report.drops_alerted,
        report.targets_added
    );
    Ok(report)
}
