//! Locale-aware price normalization
//!
//! Shop pages print prices as `1.234,56 TL` or `₺49,90`: `.` groups thousands
//! and `,` marks decimals. Everything here returns `None` instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const CURRENCY_TOKENS: &[&str] = &["TRY", "TL", "tl", "Tl", "₺"];

static CURRENCY_SUFFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d[\d.,]*)\s*(?:TL|tl|₺)").expect("valid price regex"));

static CURRENCY_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:₺|TL)\s*(\d[\d.,]*)").expect("valid price regex"));

static LOCALE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+,\d{1,2})\b").expect("valid price regex")
});

/// Open interval a scanned number must fall in to count as a price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min_exclusive: f64,
    pub max_exclusive: f64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min_exclusive: 10.0,
            max_exclusive: 1_000_000.0,
        }
    }
}

impl PriceBounds {
    pub fn contains(&self, value: f64) -> bool {
        value > self.min_exclusive && value < self.max_exclusive
    }
}

/// Turn displayed price text into a positive number.
pub fn normalize_price(raw: &str) -> Option<f64> {
    let mut text = raw.to_string();
    for token in CURRENCY_TOKENS {
        text = text.replace(token, "");
    }

    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '.' => None,
            ',' => Some('.'),
            c if c.is_ascii_digit() => Some(c),
            _ => None,
        })
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

/// Machine-formatted values such as `<meta content="1299.00">`.
///
/// Falls back to the locale rules when the value carries a decimal comma.
pub fn parse_plain_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        return normalize_price(trimmed);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

/// A price located inside a longer text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMatch<'a> {
    pub value: f64,
    /// The whole match, currency included
    pub matched: &'a str,
    /// Just the number
    pub digits: &'a str,
}

impl PriceMatch<'_> {
    /// Substrings to strip from a product name, longest first.
    pub fn literals(&self) -> Vec<String> {
        let mut literals = vec![self.matched.trim().to_string()];
        if self.digits != self.matched.trim() {
            literals.push(self.digits.to_string());
        }
        literals
    }
}

/// Find the first plausible price inside a block of free text.
///
/// Numbers tagged with a currency are preferred over bare locale-formatted
/// ones. Candidates outside `bounds` are skipped, which keeps phone numbers
/// and SKUs out.
pub fn scan_for_price(text: &str, bounds: &PriceBounds) -> Option<f64> {
    find_price(text, Some(bounds)).map(|m| m.value)
}

/// Like [`scan_for_price`], keeping the matched text. `None` bounds accepts
/// any positive value.
pub fn find_price<'a>(text: &'a str, bounds: Option<&PriceBounds>) -> Option<PriceMatch<'a>> {
    let mut tagged: Vec<(usize, &str, &str)> = CURRENCY_SUFFIXED
        .captures_iter(text)
        .chain(CURRENCY_PREFIXED.captures_iter(text))
        .filter_map(|caps| Some((caps.get(0)?, caps.get(1)?)))
        .map(|(whole, number)| (whole.start(), whole.as_str(), number.as_str()))
        .collect();
    tagged.sort_by_key(|(start, _, _)| *start);

    let bare = LOCALE_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.as_str(), m.as_str()));

    tagged
        .into_iter()
        .map(|(_, matched, digits)| (matched, digits))
        .chain(bare)
        .filter_map(|(matched, digits)| {
            normalize_price(digits).map(|value| PriceMatch {
                value,
                matched,
                digits,
            })
        })
        .find(|m| within(bounds, m.value))
}

/// Price printed in one element's text.
///
/// Elements picked by a shop's own price selector pass `None` bounds so cheap
/// and expensive items alike are accepted. The text is scanned first so stray
/// digits next to the price are not glued onto it; bare numbers without
/// separators fall through to the normalizer.
pub fn price_from_element_text<'a>(
    text: &'a str,
    bounds: Option<&PriceBounds>,
) -> Option<PriceMatch<'a>> {
    find_price(text, bounds).or_else(|| {
        let trimmed = text.trim();
        normalize_price(trimmed)
            .filter(|value| within(bounds, *value))
            .map(|value| PriceMatch {
                value,
                matched: trimmed,
                digits: trimmed,
            })
    })
}

fn within(bounds: Option<&PriceBounds>, value: f64) -> bool {
    bounds.is_none_or(|b| b.contains(value))
}
