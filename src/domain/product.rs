use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product as read off a page, after price normalization.
///
/// Only candidates with a valid positive price are ever turned into this type;
/// anything else is dropped inside the extraction strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedProduct {
    pub name: String,
    pub url: String,
    pub price: f64,
    pub image: Option<String>,
}

impl ExtractedProduct {
    pub fn new(name: impl Into<String>, url: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            price,
            image: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Last known state of one tracked product, keyed by `url` in the ledger.
///
/// `url` is not written inside the stored value; the ledger file keys entries
/// by it and fills it back in on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(skip)]
    pub url: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub image: String,
    #[serde(with = "epoch_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn from_extracted(product: &ExtractedProduct, updated_at: DateTime<Utc>) -> Self {
        Self {
            url: product.url.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone().unwrap_or_default(),
            updated_at,
        }
    }

    /// Name and image follow the latest observation; price and timestamp are
    /// left to the caller.
    pub(crate) fn refresh_details(&mut self, product: &ExtractedProduct) {
        self.name.clone_from(&product.name);
        self.image = product.image.clone().unwrap_or_default();
    }
}

/// `updated_at` is stored as a plain epoch-seconds number so the ledger stays
/// readable by the dashboard and by older files that wrote fractional seconds.
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = value.timestamp_millis();
        if millis % 1000 == 0 {
            serializer.serialize_i64(value.timestamp())
        } else {
            serializer.serialize_f64(millis as f64 / 1000.0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(D::Error::custom(format!("invalid epoch seconds: {seconds}")));
        }
        let millis = (seconds * 1000.0).round() as i64;
        DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| D::Error::custom(format!("epoch seconds out of range: {seconds}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_serializes_epoch_seconds_without_url() {
        let record = ProductRecord {
            url: "https://shop.example/p/1".to_string(),
            name: "Watch".to_string(),
            price: 1299.5,
            image: String::new(),
            updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["updated_at"], serde_json::json!(1_700_000_000));
        assert_eq!(value["price"], serde_json::json!(1299.5));
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_record_accepts_fractional_timestamps() {
        let json = r#"{"name":"Scarf","price":49.9,"updated_at":1732012345.25}"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.updated_at.timestamp_millis(), 1_732_012_345_250);
        assert!(record.image.is_empty());
    }

    #[test]
    fn test_blank_image_is_dropped() {
        let product = ExtractedProduct::new("Cap", "https://shop.example/cap", 120.0)
            .with_image(Some("  ".to_string()));
        assert!(product.image.is_none());
    }
}
