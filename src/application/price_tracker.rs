//! One scraping cycle over the target list
//!
//! Targets are processed strictly one after another. Each is dispatched to a
//! strategy chain, extracted under a timeout, and every product found is
//! diffed into the ledger. Per-target problems are logged and counted; they
//! never stop the cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{DropAlert, ExtractedProduct, Ledger, PriceChange, PricePolicy, TargetList};
use crate::infrastructure::browser::{BrowserDriver, PageHandle};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::parsing::{
    Dispatch, ExtractionContext, ExtractionError, PriceBounds, SiteDispatcher, StrategyChain,
    StrategyOutcome,
};

/// Counts reported at the end of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub targets_processed: usize,
    pub targets_failed: usize,
    pub targets_skipped: usize,
    pub records_observed: usize,
    pub records_new: usize,
    pub drops_alerted: usize,
    pub targets_added: usize,
}

/// Knobs the tracker needs, lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub policy: PricePolicy,
    pub bounds: PriceBounds,
    pub text_scan_limit: usize,
    pub navigation_timeout: Duration,
    pub target_timeout: Duration,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
}

impl TrackerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            policy: config.tracking.policy(),
            bounds: config.tracking.bounds(),
            text_scan_limit: config.tracking.text_scan_limit,
            navigation_timeout: config.browser.navigation_timeout(),
            target_timeout: config.browser.target_timeout(),
            pacing_min: Duration::from_millis(config.browser.pacing_min_ms),
            pacing_max: Duration::from_millis(config.browser.pacing_max_ms),
        }
    }

    /// Random pause in `[pacing_min, pacing_max]`.
    fn pacing_delay(&self) -> Duration {
        let min = self.pacing_min.as_millis() as u64;
        let max = self.pacing_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

/// How a single target went.
enum TargetOutcome {
    Extracted(Vec<ExtractedProduct>),
    Failed(String),
}

pub struct PriceTracker {
    browser: Arc<dyn BrowserDriver>,
    dispatcher: SiteDispatcher,
    notifier: Arc<dyn Notifier>,
    settings: TrackerSettings,
}

impl PriceTracker {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        dispatcher: SiteDispatcher,
        notifier: Arc<dyn Notifier>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            browser,
            dispatcher,
            notifier,
            settings,
        }
    }

    /// Scrape every target once and merge the results into `ledger`.
    ///
    /// `now` stamps every record whose price changed in this cycle.
    pub async fn run_cycle(
        &self,
        targets: &TargetList,
        ledger: &mut Ledger,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        info!("Starting price check of {} target(s)", targets.len());

        for (index, url) in targets.iter().enumerate() {
            if index > 0 {
                pause(self.settings.pacing_delay()).await;
            }

            let chain = match self.dispatcher.dispatch(url) {
                Dispatch::Chain(chain) => chain,
                Dispatch::Skip(reason) => {
                    info!("Skipping {}: {}", url, reason);
                    report.targets_skipped += 1;
                    continue;
                }
            };

            info!("Checking {} with '{}'", url, chain.name());
            match self.check_target(url, chain, ledger, now, &mut report).await {
                Ok(()) => report.targets_processed += 1,
                Err(reason) => {
                    warn!("No products from {}: {}", url, reason);
                    report.targets_failed += 1;
                }
            }
        }

        if report.drops_alerted == 0 {
            let summary = format!(
                "Price check complete, no price drops.\n{} product(s) checked across {} link(s).",
                report.records_observed,
                targets.len()
            );
            if let Err(e) = self.notifier.send_text(&summary).await {
                warn!("Failed to send cycle summary: {}", e);
            }
        }

        report
    }

    async fn check_target(
        &self,
        url: &str,
        chain: &StrategyChain,
        ledger: &mut Ledger,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), String> {
        let ctx = ExtractionContext::new(url, self.settings.bounds)
            .map_err(|e| e.to_string())?
            .with_text_scan_limit(self.settings.text_scan_limit)
            .with_fallback_name(chain.fallback_name());

        let page = self
            .browser
            .navigate(url, self.settings.navigation_timeout)
            .await
            .map_err(|e| e.to_string())?;
        pause(self.settings.pacing_delay()).await;

        let outcome = self.extract(chain, page, &ctx).await;
        let result = match outcome {
            TargetOutcome::Extracted(products) => {
                info!("{} product(s) found on {}", products.len(), url);
                let alerts = apply_products(&products, ledger, now, &self.settings.policy, report);
                self.send_alerts(page, &alerts).await;
                report.drops_alerted += alerts.len();
                Ok(())
            }
            TargetOutcome::Failed(reason) => Err(reason),
        };

        if let Err(e) = self.browser.close(page).await {
            debug!("Closing page for {} failed: {}", url, e);
        }
        result
    }

    async fn extract(
        &self,
        chain: &StrategyChain,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> TargetOutcome {
        let extraction = chain.extract(self.browser.as_ref(), page, ctx);
        match tokio::time::timeout(self.settings.target_timeout, extraction).await {
            Ok(StrategyOutcome::Found(products)) => TargetOutcome::Extracted(products),
            Ok(StrategyOutcome::NoCandidates) => {
                warn!("No product candidates on {}", ctx.target_url);
                TargetOutcome::Extracted(Vec::new())
            }
            Ok(StrategyOutcome::TransientFailure(reason)) => TargetOutcome::Failed(reason),
            Err(_) => TargetOutcome::Failed(
                ExtractionError::Timeout {
                    url: ctx.target_url.clone(),
                    seconds: self.settings.target_timeout.as_secs(),
                }
                .to_string(),
            ),
        }
    }

    /// Send every alert for one page, capturing the page at most once.
    async fn send_alerts(&self, page: PageHandle, alerts: &[DropAlert]) {
        if alerts.is_empty() {
            return;
        }

        let capture = match self.browser.capture_image(page).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                debug!("No page capture for alerts, sending text only: {}", e);
                None
            }
        };

        for alert in alerts {
            info!(
                "Price drop -{}% on {}: {} -> {}",
                alert.discount_percent, alert.url, alert.old_price, alert.new_price
            );
            let message = alert.message();
            let sent = match &capture {
                Some(bytes) => self.notifier.send_text_with_image(&message, bytes).await,
                None => self.notifier.send_text(&message).await,
            };
            if let Err(e) = sent {
                warn!("Failed to send drop alert for {}: {}", alert.url, e);
            }
        }
    }
}

/// Merge extracted products into the ledger, returning the alerts raised.
fn apply_products(
    products: &[ExtractedProduct],
    ledger: &mut Ledger,
    now: DateTime<Utc>,
    policy: &PricePolicy,
    report: &mut CycleReport,
) -> Vec<DropAlert> {
    let mut alerts = Vec::new();
    for product in products {
        match ledger.apply(product, now, policy) {
            PriceChange::New => {
                report.records_observed += 1;
                report.records_new += 1;
            }
            PriceChange::Unchanged | PriceChange::Increased { .. } => report.records_observed += 1,
            PriceChange::Dropped { alert, discount_percent, .. } => {
                report.records_observed += 1;
                match alert {
                    Some(alert) => alerts.push(alert),
                    None => debug!(
                        "Drop of {}% on {} below threshold, recorded silently",
                        discount_percent, product.url
                    ),
                }
            }
            PriceChange::Rejected => debug!("Discarded {} without a usable price", product.url),
        }
    }
    alerts
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::{SnapshotBrowser, StaticPageSource};
    use crate::infrastructure::parsing::config::builtin_profiles;
    use crate::infrastructure::parsing::ScrollPolicy;
    use crate::test_utils::RecordingNotifier;
    use chrono::TimeZone;

    const ITEM: &str = "https://shop.example/urun/kahve-makinesi";

    fn item_page(price: &str) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="Kahve Makinesi"></head>
            <body><h1>Kahve Makinesi</h1><span class="price">{price}</span></body></html>"#
        )
    }

    fn settings() -> TrackerSettings {
        TrackerSettings::from_config(&AppConfig {
            browser: AppConfig::default().browser.without_pacing(),
            ..AppConfig::default()
        })
    }

    async fn tracker(
        pages: &[(&str, String)],
        skip: &[String],
    ) -> (PriceTracker, Arc<RecordingNotifier>, Arc<StaticPageSource>) {
        let source = Arc::new(StaticPageSource::new());
        for (url, html) in pages {
            source.set_page(*url, html.clone()).await;
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = SiteDispatcher::from_profiles(
            &builtin_profiles(),
            skip,
            ScrollPolicy {
                max_iterations: 1,
                settle: Duration::ZERO,
            },
        );
        let tracker = PriceTracker::new(
            Arc::new(SnapshotBrowser::new(source.clone())),
            dispatcher,
            notifier.clone(),
            settings(),
        );
        (tracker, notifier, source)
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_sighting_is_silent_except_summary() {
        let (tracker, notifier, _) = tracker(&[(ITEM, item_page("1.000,00 TL"))], &[]).await;
        let targets: TargetList = [ITEM].into_iter().collect();
        let mut ledger = Ledger::new();

        let report = tracker.run_cycle(&targets, &mut ledger, at(1_000)).await;

        assert_eq!(report.targets_processed, 1);
        assert_eq!(report.records_new, 1);
        assert_eq!(report.drops_alerted, 0);
        assert_eq!(ledger.get(ITEM).unwrap().price, 1000.0);
        let texts = notifier.texts().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("no price drops"));
    }

    #[tokio::test]
    async fn test_drop_alert_uses_one_capture() {
        let (tracker, notifier, source) = tracker(&[(ITEM, item_page("1.000,00 TL"))], &[]).await;
        source.set_screenshot(ITEM, vec![7; 16]).await;
        let targets: TargetList = [ITEM].into_iter().collect();
        let mut ledger = Ledger::new();
        tracker.run_cycle(&targets, &mut ledger, at(1_000)).await;
        notifier.clear().await;

        source.set_page(ITEM, item_page("940,00 TL")).await;
        let report = tracker.run_cycle(&targets, &mut ledger, at(2_000)).await;

        assert_eq!(report.drops_alerted, 1);
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image_bytes, Some(16));
        assert!(sent[0].text.contains("-6%"));
        assert!(sent[0].text.contains("1000"));
        assert!(sent[0].text.contains("940"));
        assert_eq!(ledger.get(ITEM).unwrap().updated_at, at(2_000));
    }

    #[tokio::test]
    async fn test_small_drop_is_silent_and_capture_failure_falls_back_to_text() {
        let (tracker, notifier, source) = tracker(&[(ITEM, item_page("1.000,00 TL"))], &[]).await;
        let targets: TargetList = [ITEM].into_iter().collect();
        let mut ledger = Ledger::new();
        tracker.run_cycle(&targets, &mut ledger, at(1_000)).await;

        source.set_page(ITEM, item_page("960,00 TL")).await;
        let report = tracker.run_cycle(&targets, &mut ledger, at(2_000)).await;
        assert_eq!(report.drops_alerted, 0);
        assert_eq!(ledger.get(ITEM).unwrap().price, 960.0);

        notifier.clear().await;
        source.set_page(ITEM, item_page("800,00 TL")).await;
        let report = tracker.run_cycle(&targets, &mut ledger, at(3_000)).await;

        assert_eq!(report.drops_alerted, 1);
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image_bytes, None);
    }

    #[tokio::test]
    async fn test_failures_and_skips_do_not_stop_the_cycle() {
        let missing = "https://shop.example/gone";
        let skipped = "https://shop.example/outlet/x";
        let (tracker, _, _) = tracker(
            &[(ITEM, item_page("250,00 TL"))],
            &["/outlet/".to_string()],
        )
        .await;
        let targets: TargetList = [missing, skipped, ITEM].into_iter().collect();
        let mut ledger = Ledger::new();

        let report = tracker.run_cycle(&targets, &mut ledger, at(1_000)).await;

        assert_eq!(report.targets_failed, 1);
        assert_eq!(report.targets_skipped, 1);
        assert_eq!(report.targets_processed, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_pacing_delay_stays_in_range() {
        let mut settings = settings();
        settings.pacing_min = Duration::from_millis(10);
        settings.pacing_max = Duration::from_millis(20);
        for _ in 0..50 {
            let delay = settings.pacing_delay();
            assert!(delay >= settings.pacing_min && delay <= settings.pacing_max);
        }
        settings.pacing_max = Duration::ZERO;
        settings.pacing_min = Duration::ZERO;
        assert!(settings.pacing_delay().is_zero());
    }
}
