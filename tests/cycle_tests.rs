//! Full cycles against in-memory pages, a recording notifier and a scripted inbox

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::{TempDir, tempdir};

use price_watch_lib::domain::InboundCommand;
use price_watch_lib::infrastructure::browser::{SnapshotBrowser, StaticPageSource};
use price_watch_lib::infrastructure::config::AppConfig;
use price_watch_lib::infrastructure::storage::{CursorStore, LedgerStore, TargetStore};
use price_watch_lib::test_utils::{RecordingNotifier, ScriptedCommandSource};
use price_watch_lib::{Collaborators, run_with};

const OWNER: &str = "4242";
const WATCH: &str = "https://shop.example/urun/saat-123";
const CATEGORY: &str = "https://www.gsstore.org/forma";

fn detail_page(price: &str) -> String {
    format!(
        r#"<html><head><title>Otomatik Saat</title></head>
        <body><div class="product-info-main"><h1 class="page-title">Otomatik Saat</h1>
        <span class="price">{price}</span></div></body></html>"#
    )
}

fn category_page(prices: [&str; 2]) -> String {
    format!(
        r#"<html><body><ol class="products">
          <li class="product-item">
            <a class="product-item-link" href="/forma-ic-saha">Ic Saha Forma</a>
            <span class="product-price">{}</span><img src="/media/ic.jpg">
          </li>
          <li class="product-item">
            <a class="product-item-link" href="/forma-dis-saha">Dis Saha Forma</a>
            <span class="product-price">{}</span>
          </li>
        </ol></body></html>"#,
        prices[0], prices[1]
    )
}

struct Harness {
    dir: TempDir,
    config: AppConfig,
    pages: Arc<StaticPageSource>,
    notifier: Arc<RecordingNotifier>,
    inbox: Arc<ScriptedCommandSource>,
}

impl Harness {
    async fn new(targets: &[&str]) -> Self {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.targets_path = dir.path().join("urls.txt");
        config.storage.ledger_path = dir.path().join("prices.json");
        config.storage.cursor_path = dir.path().join("telegram_cursor.txt");
        config.browser = config.browser.without_pacing();
        config.telegram.chat_id = Some(OWNER.to_string());

        let list = targets.iter().map(|t| format!("{t}\n")).collect::<String>();
        std::fs::write(&config.storage.targets_path, list).unwrap();

        Self {
            dir,
            config,
            pages: Arc::new(StaticPageSource::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            inbox: Arc::new(ScriptedCommandSource::new(Vec::new())),
        }
    }

    async fn cycle(&self, now: DateTime<Utc>) -> price_watch_lib::application::CycleReport {
        let collaborators = Collaborators {
            browser: Arc::new(SnapshotBrowser::new(self.pages.clone())),
            notifier: self.notifier.clone(),
            commands: Some(self.inbox.clone()),
        };
        run_with(&self.config, collaborators, now).await.unwrap()
    }

    fn ledger_path(&self) -> &Path {
        &self.config.storage.ledger_path
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

#[tokio::test]
async fn test_three_cycles_insert_alert_then_stay_quiet() {
    let h = Harness::new(&[WATCH]).await;
    let ledger = LedgerStore::new(h.ledger_path());

    h.pages.set_page(WATCH, detail_page("500,00 TL")).await;
    let first = h.cycle(at(1_000)).await;
    assert_eq!(first.records_new, 1);
    assert_eq!(first.drops_alerted, 0);
    let record = ledger.load().await.unwrap().get(WATCH).cloned().unwrap();
    assert_eq!(record.price, 500.0);
    assert_eq!(record.updated_at, at(1_000));
    let texts = h.notifier.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("no price drops"));

    h.notifier.clear().await;
    h.pages.set_page(WATCH, detail_page("450,00 TL")).await;
    let second = h.cycle(at(2_000)).await;
    assert_eq!(second.drops_alerted, 1);
    let texts = h.notifier.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("-10%"));
    assert!(texts[0].contains("500"));
    assert!(texts[0].contains("450"));
    assert!(texts[0].contains(WATCH));
    let record = ledger.load().await.unwrap().get(WATCH).cloned().unwrap();
    assert_eq!(record.price, 450.0);
    assert_eq!(record.updated_at, at(2_000));

    h.notifier.clear().await;
    let third = h.cycle(at(3_000)).await;
    assert_eq!(third.drops_alerted, 0);
    let texts = h.notifier.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("no price drops"));
    let record = ledger.load().await.unwrap().get(WATCH).cloned().unwrap();
    assert_eq!(record.price, 450.0);
    assert_eq!(record.updated_at, at(2_000));
}

#[tokio::test]
async fn test_list_page_products_are_tracked_individually() {
    let h = Harness::new(&[CATEGORY]).await;
    h.pages.set_page(CATEGORY, category_page(["2.499,90 TL", "2.299,90 TL"])).await;

    let report = h.cycle(at(1_000)).await;

    assert_eq!(report.records_new, 2);
    let ledger = LedgerStore::new(h.ledger_path()).load().await.unwrap();
    let home = ledger.get("https://www.gsstore.org/forma-ic-saha").unwrap();
    assert_eq!(home.name, "Ic Saha Forma");
    assert_eq!(home.price, 2499.9);
    assert_eq!(home.image, "https://www.gsstore.org/media/ic.jpg");
    assert!(ledger.get("https://www.gsstore.org/forma-dis-saha").is_some());
}

#[tokio::test]
async fn test_increases_and_unchanged_send_exactly_one_summary() {
    let h = Harness::new(&[WATCH, CATEGORY]).await;
    h.pages.set_page(WATCH, detail_page("500,00 TL")).await;
    h.pages.set_page(CATEGORY, category_page(["100,00 TL", "200,00 TL"])).await;
    h.cycle(at(1_000)).await;
    h.notifier.clear().await;

    h.pages.set_page(WATCH, detail_page("650,00 TL")).await;
    h.pages.set_page(CATEGORY, category_page(["100,00 TL", "240,00 TL"])).await;
    let report = h.cycle(at(2_000)).await;

    assert_eq!(report.records_observed, 3);
    assert_eq!(report.drops_alerted, 0);
    assert_eq!(h.notifier.texts().await.len(), 1);

    let ledger = LedgerStore::new(h.ledger_path()).load().await.unwrap();
    assert_eq!(ledger.get(WATCH).unwrap().updated_at, at(2_000));
    assert_eq!(
        ledger.get("https://www.gsstore.org/forma-ic-saha").unwrap().updated_at,
        at(1_000)
    );
}

#[tokio::test]
async fn test_added_target_is_scraped_in_the_same_run_and_never_replayed() {
    let h = Harness::new(&[]).await;
    h.pages.set_page(WATCH, detail_page("500,00 TL")).await;
    h.inbox.push(InboundCommand::new(900, OWNER, format!("/ekle {WATCH}"))).await;
    h.inbox.push(InboundCommand::new(901, "1", "/add https://evil.example/x")).await;

    let report = h.cycle(at(1_000)).await;

    assert_eq!(report.targets_added, 1);
    assert_eq!(report.records_new, 1);
    assert_eq!(CursorStore::new(&h.config.storage.cursor_path).load().await.unwrap(), 901);
    let targets = TargetStore::new(&h.config.storage.targets_path)
        .load_or_initialize()
        .await
        .unwrap();
    assert_eq!(targets.iter().collect::<Vec<_>>(), vec![WATCH]);
    let texts = h.notifier.texts().await;
    assert!(texts[0].starts_with("Link added!"));

    h.notifier.clear().await;
    let replay = h.cycle(at(2_000)).await;
    assert_eq!(replay.targets_added, 0);
    let texts = h.notifier.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(!texts[0].starts_with("Link added!"));
}

#[tokio::test]
async fn test_corrupt_ledger_fails_the_run_without_rewriting_it() {
    let h = Harness::new(&[WATCH]).await;
    h.pages.set_page(WATCH, detail_page("500,00 TL")).await;
    std::fs::write(h.ledger_path(), "{ not json").unwrap();

    let collaborators = Collaborators {
        browser: Arc::new(SnapshotBrowser::new(h.pages.clone())),
        notifier: h.notifier.clone(),
        commands: None,
    };
    let result = run_with(&h.config, collaborators, at(1_000)).await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(h.ledger_path()).unwrap(), "{ not json");
    assert!(h.notifier.texts().await.is_empty());
}

#[tokio::test]
async fn test_corrupt_ledger_leaves_inbox_commands_unconsumed() {
    let h = Harness::new(&[]).await;
    h.pages.set_page(WATCH, detail_page("500,00 TL")).await;
    h.inbox.push(InboundCommand::new(5, OWNER, format!("/add {WATCH}"))).await;
    std::fs::write(h.ledger_path(), "{ not json").unwrap();

    let collaborators = Collaborators {
        browser: Arc::new(SnapshotBrowser::new(h.pages.clone())),
        notifier: h.notifier.clone(),
        commands: Some(h.inbox.clone()),
    };
    let result = run_with(&h.config, collaborators, at(1_000)).await;

    assert!(result.is_err());
    assert_eq!(CursorStore::new(&h.config.storage.cursor_path).load().await.unwrap(), 0);
    assert_eq!(std::fs::read_to_string(&h.config.storage.targets_path).unwrap(), "");
    assert!(h.notifier.texts().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_target_still_saves_the_ledger() {
    let h = Harness::new(&["https://shop.example/404", WATCH]).await;
    h.pages.set_page(WATCH, detail_page("75,50 TL")).await;

    let report = h.cycle(at(1_000)).await;

    assert_eq!(report.targets_failed, 1);
    assert_eq!(report.targets_processed, 1);
    let ledger = LedgerStore::new(h.ledger_path()).load().await.unwrap();
    assert_eq!(ledger.get(WATCH).unwrap().price, 75.5);
    assert!(h.dir.path().join("prices.json").exists());
}
