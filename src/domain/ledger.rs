//! Price ledger and change detection
//!
//! The ledger maps a product url to the last record seen for it. Every
//! observation refreshes name and image, but `updated_at` only moves when the
//! price itself changes, so a ledger kept under version control does not churn
//! on quiet cycles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::{ExtractedProduct, ProductRecord};

/// Thresholds applied when a price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePolicy {
    /// Minimum floor-rounded drop percentage that produces an alert.
    pub discount_threshold_percent: u32,
}

impl Default for PricePolicy {
    fn default() -> Self {
        Self {
            discount_threshold_percent: 5,
        }
    }
}

/// A price drop worth telling someone about.
#[derive(Debug, Clone, PartialEq)]
pub struct DropAlert {
    pub name: String,
    pub url: String,
    pub old_price: f64,
    pub new_price: f64,
    pub discount_percent: u32,
}

impl DropAlert {
    pub fn message(&self) -> String {
        format!(
            "PRICE DROP (-{}%)\n\n{}\nOld: {} TL\nNew: {} TL\nLink: {}",
            self.discount_percent,
            self.name,
            format_price(self.old_price),
            format_price(self.new_price),
            self.url
        )
    }
}

/// What happened to a ledger entry when a fresh observation was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceChange {
    /// First sighting of this url.
    New,
    Unchanged,
    Increased { old_price: f64 },
    /// `alert` is present only when the drop reached the policy threshold.
    Dropped {
        old_price: f64,
        discount_percent: u32,
        alert: Option<DropAlert>,
    },
    /// The observation carried no usable price and was not applied.
    Rejected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, ProductRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&ProductRecord> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.entries.values()
    }

    /// Parse the on-disk JSON form, restoring each record's `url` from its key.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut ledger: Self = serde_json::from_str(json)?;
        for (url, record) in &mut ledger.entries {
            record.url.clone_from(url);
        }
        Ok(ledger)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Diff one observation against the ledger and merge it in.
    pub fn apply(
        &mut self,
        product: &ExtractedProduct,
        now: DateTime<Utc>,
        policy: &PricePolicy,
    ) -> PriceChange {
        if !(product.price.is_finite() && product.price > 0.0) {
            return PriceChange::Rejected;
        }

        let Some(record) = self.entries.get_mut(&product.url) else {
            self.entries.insert(
                product.url.clone(),
                ProductRecord::from_extracted(product, now),
            );
            return PriceChange::New;
        };

        let old_price = record.price;
        record.refresh_details(product);

        if same_price(old_price, product.price) {
            return PriceChange::Unchanged;
        }

        record.price = product.price;
        record.updated_at = now;

        if product.price > old_price {
            return PriceChange::Increased { old_price };
        }

        let discount = discount_percent(old_price, product.price);
        let alert = (discount >= policy.discount_threshold_percent).then(|| DropAlert {
            name: product.name.clone(),
            url: product.url.clone(),
            old_price,
            new_price: product.price,
            discount_percent: discount,
        });

        PriceChange::Dropped {
            old_price,
            discount_percent: discount,
            alert,
        }
    }
}

/// Floor-rounded percentage drop from `old_price` to `new_price`.
pub fn discount_percent(old_price: f64, new_price: f64) -> u32 {
    if old_price <= 0.0 || new_price >= old_price {
        return 0;
    }
    // Nudge before flooring so 6.000000000000001 and 5.999999999999999 both read as 6.
    let percent = 100.0 * (old_price - new_price) / old_price;
    (percent + 1e-9).floor() as u32
}

pub fn format_price(price: f64) -> String {
    if (price - price.round()).abs() < 1e-9 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

fn same_price(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn product(price: f64) -> ExtractedProduct {
        ExtractedProduct::new("Seiko 5", "https://shop.example/seiko-5", price)
    }

    #[test]
    fn test_first_sighting_inserts_without_alert() {
        let mut ledger = Ledger::new();
        let change = ledger.apply(&product(500.0), at(100), &PricePolicy::default());

        assert_eq!(change, PriceChange::New);
        let record = ledger.get("https://shop.example/seiko-5").unwrap();
        assert_eq!(record.price, 500.0);
        assert_eq!(record.updated_at, at(100));
        assert_eq!(record.url, "https://shop.example/seiko-5");
    }

    #[test]
    fn test_unchanged_price_keeps_timestamp_but_refreshes_name() {
        let mut ledger = Ledger::new();
        let policy = PricePolicy::default();
        ledger.apply(&product(500.0), at(100), &policy);

        let mut renamed = product(500.0);
        renamed.name = "Seiko 5 Sports".to_string();
        renamed.image = Some("https://cdn.example/s5.jpg".to_string());
        let change = ledger.apply(&renamed, at(200), &policy);

        assert_eq!(change, PriceChange::Unchanged);
        let record = ledger.get(&renamed.url).unwrap();
        assert_eq!(record.updated_at, at(100));
        assert_eq!(record.name, "Seiko 5 Sports");
        assert_eq!(record.image, "https://cdn.example/s5.jpg");
    }

    #[test]
    fn test_price_increase_is_recorded_silently() {
        let mut ledger = Ledger::new();
        let policy = PricePolicy::default();
        ledger.apply(&product(500.0), at(100), &policy);

        let change = ledger.apply(&product(650.0), at(200), &policy);

        assert_eq!(change, PriceChange::Increased { old_price: 500.0 });
        let record = ledger.get("https://shop.example/seiko-5").unwrap();
        assert_eq!(record.price, 650.0);
        assert_eq!(record.updated_at, at(200));
    }

    #[test]
    fn test_small_drop_updates_without_alert() {
        let mut ledger = Ledger::new();
        let policy = PricePolicy::default();
        ledger.apply(&product(1000.0), at(100), &policy);

        let change = ledger.apply(&product(960.0), at(200), &policy);

        assert_eq!(
            change,
            PriceChange::Dropped {
                old_price: 1000.0,
                discount_percent: 4,
                alert: None
            }
        );
        assert_eq!(ledger.get("https://shop.example/seiko-5").unwrap().updated_at, at(200));
    }

    #[test]
    fn test_drop_over_threshold_produces_alert() {
        let mut ledger = Ledger::new();
        let policy = PricePolicy::default();
        ledger.apply(&product(1000.0), at(100), &policy);

        let PriceChange::Dropped { alert: Some(alert), discount_percent: discount, .. } =
            ledger.apply(&product(940.0), at(200), &policy)
        else {
            panic!("expected an alert");
        };

        assert_eq!(discount, 6);
        let message = alert.message();
        assert!(message.contains('6'));
        assert!(message.contains("1000"));
        assert!(message.contains("940"));
        assert!(message.contains("https://shop.example/seiko-5"));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let mut ledger = Ledger::new();
        let policy = PricePolicy {
            discount_threshold_percent: 10,
        };
        ledger.apply(&product(1000.0), at(100), &policy);

        let change = ledger.apply(&product(940.0), at(200), &policy);
        assert!(matches!(change, PriceChange::Dropped { alert: None, .. }));
    }

    #[test]
    fn test_non_positive_price_is_rejected() {
        let mut ledger = Ledger::new();
        let change = ledger.apply(&product(0.0), at(100), &PricePolicy::default());

        assert_eq!(change, PriceChange::Rejected);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_discount_percent_floors() {
        assert_eq!(discount_percent(500.0, 450.0), 10);
        assert_eq!(discount_percent(1000.0, 940.0), 6);
        assert_eq!(discount_percent(1000.0, 951.0), 4);
        assert_eq!(discount_percent(100.0, 120.0), 0);
    }

    #[test]
    fn test_json_round_trip_restores_urls() {
        let mut ledger = Ledger::new();
        ledger.apply(&product(1299.99), at(1_700_000_000), &PricePolicy::default());

        let json = ledger.to_json().unwrap();
        let restored = Ledger::from_json(&json).unwrap();

        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1000.0), "1000");
        assert_eq!(format_price(49.9), "49.90");
    }

    proptest! {
        #[test]
        fn prop_repeated_observation_keeps_timestamp(
            price in 0.01f64..1_000_000.0,
            first in 1_000i64..2_000_000_000,
            later in 1i64..10_000_000,
        ) {
            let mut ledger = Ledger::new();
            let policy = PricePolicy::default();
            let observed = product(price);

            ledger.apply(&observed, at(first), &policy);
            let change = ledger.apply(&observed, at(first + later), &policy);

            prop_assert_eq!(change, PriceChange::Unchanged);
            prop_assert_eq!(ledger.get(&observed.url).unwrap().updated_at, at(first));
        }
    }
}
