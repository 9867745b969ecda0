//! Ordered-fallback field readers shared by the strategies
//!
//! Each reader walks a selector list in order and returns the first usable
//! value. A selector the driver rejects is logged and skipped; any other
//! driver error aborts the read.

use tracing::warn;

use super::config::is_meta_hint;
use super::price::{PriceBounds, PriceMatch, parse_plain_decimal, price_from_element_text};
use crate::infrastructure::browser::{BrowserDriver, ElementHandle, PageHandle};
use crate::infrastructure::parsing_error::ExtractionResult;

/// Attributes holding an image url, in preference order.
pub const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src"];

/// Where a selector is evaluated.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Page(PageHandle),
    Element(ElementHandle),
}

/// A price together with the text it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReading {
    pub value: f64,
    /// Printed forms of the price, stripped from product names.
    pub literals: Vec<String>,
}

impl From<PriceMatch<'_>> for PriceReading {
    fn from(found: PriceMatch<'_>) -> Self {
        Self {
            value: found.value,
            literals: found.literals(),
        }
    }
}

pub async fn select(
    browser: &dyn BrowserDriver,
    scope: Scope,
    hint: &str,
) -> ExtractionResult<Vec<ElementHandle>> {
    let found = match scope {
        Scope::Page(page) => browser.query(page, hint).await,
        Scope::Element(element) => browser.query_within(element, hint).await,
    };
    match found {
        Ok(elements) => Ok(elements),
        Err(e) if e.is_invalid_hint() => {
            warn!("Skipping selector: {}", e);
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Text of the first element matched by the first productive selector.
/// `<meta>` selectors yield their `content` attribute.
pub async fn first_text(
    browser: &dyn BrowserDriver,
    scope: Scope,
    selectors: &[String],
) -> ExtractionResult<Option<String>> {
    for hint in selectors {
        let Some(element) = select(browser, scope, hint).await?.into_iter().next() else {
            continue;
        };
        let value = if is_meta_hint(hint) {
            browser.read_attribute(element, "content").await?
        } else {
            Some(browser.read_text(element).await?)
        };
        if let Some(text) = non_blank(value) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// First non-blank attribute among `attributes` on the first matched element.
/// `<meta>` selectors read `content` instead.
pub async fn first_attribute(
    browser: &dyn BrowserDriver,
    scope: Scope,
    selectors: &[String],
    attributes: &[&str],
) -> ExtractionResult<Option<String>> {
    for hint in selectors {
        let Some(element) = select(browser, scope, hint).await?.into_iter().next() else {
            continue;
        };
        let names: &[&str] = if is_meta_hint(hint) { &["content"] } else { attributes };
        for name in names {
            if let Some(value) = non_blank(browser.read_attribute(element, name).await?) {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

/// First valid price among the first `per_selector` elements of each selector.
///
/// Metadata prices are machine formatted and only need to be positive; text
/// prices go through the locale rules and, when `bounds` is given, must lie
/// within it.
pub async fn first_price(
    browser: &dyn BrowserDriver,
    scope: Scope,
    selectors: &[String],
    bounds: Option<&PriceBounds>,
    per_selector: usize,
) -> ExtractionResult<Option<PriceReading>> {
    for hint in selectors {
        let elements = select(browser, scope, hint).await?;
        for element in elements.into_iter().take(per_selector) {
            if is_meta_hint(hint) {
                let content = browser.read_attribute(element, "content").await?;
                if let Some(content) = non_blank(content) {
                    if let Some(value) = parse_plain_decimal(&content) {
                        return Ok(Some(PriceReading {
                            value,
                            literals: vec![content],
                        }));
                    }
                }
                continue;
            }

            let text = browser.read_text(element).await?;
            if let Some(found) = price_from_element_text(&text, bounds) {
                return Ok(Some(found.into()));
            }
        }
    }
    Ok(None)
}

/// Drop the literal price text some shops render inside the title.
pub fn clean_name(name: &str, price_literals: &[String], fallback: &str) -> String {
    let mut literals: Vec<&str> = price_literals
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    literals.sort_by_key(|l| std::cmp::Reverse(l.len()));

    let mut cleaned = name.to_string();
    for literal in literals {
        cleaned = cleaned.replace(literal, "");
    }
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
