//! Parsing configuration for product extraction
//!
//! Centralized selector configuration. Every field is an ordered list of
//! fallbacks: the first selector that yields a usable value wins.

use serde::{Deserialize, Serialize};

/// Selectors that only make sense on a `<meta>` tag read the `content` attribute.
pub fn is_meta_hint(selector: &str) -> bool {
    selector.trim_start().starts_with("meta")
}

/// One shop and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Display name, also used in logs
    pub name: String,

    /// Substring matched against the target url
    pub domain_pattern: String,

    /// Repeated product cards on category/search pages
    #[serde(default)]
    pub list_page: Option<ListPageSelectors>,

    /// Single product detail page
    #[serde(default)]
    pub single_page: Option<SinglePageSelectors>,

    /// Name used when no title selector matches
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
}

fn default_fallback_name() -> String {
    "Unnamed product".to_string()
}

/// CSS selectors for product list pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPageSelectors {
    /// Product card fingerprints, in priority order
    pub card: Vec<String>,

    /// Detail link inside a card; its text doubles as the name
    pub link: Vec<String>,

    /// Name inside a card when the link carries no usable text
    #[serde(default)]
    pub name: Vec<String>,

    /// Price inside a card
    pub price: Vec<String>,

    /// Image inside a card
    #[serde(default = "default_card_image")]
    pub image: Vec<String>,

    /// Upper bound on cards read per page
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
}

fn default_card_image() -> Vec<String> {
    vec!["img".to_string()]
}

const fn default_max_cards() -> usize {
    50
}

/// CSS selectors for product detail pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglePageSelectors {
    pub price: Vec<String>,
    pub title: Vec<String>,
    pub image: Vec<String>,
}

impl Default for SinglePageSelectors {
    fn default() -> Self {
        Self {
            price: strings(&[
                ".product-info-main .price",
                ".special-price .price",
                ".price-box .price",
                "[class*='product-price']",
                "[data-price-type='finalPrice']",
                "meta[property='product:price:amount']",
            ]),
            title: strings(&[
                "h1.page-title",
                "h1[class*='product-name']",
                "h1",
                ".product-name",
                "meta[property='og:title']",
            ]),
            image: strings(&[
                ".gallery-placeholder__image",
                ".fotorama__img",
                ".product-image-photo",
                "meta[property='og:image']",
            ]),
        }
    }
}

/// Selectors for the site-agnostic strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericPageSelectors {
    pub title: Vec<String>,
    pub image: Vec<String>,
    pub price_meta: Vec<String>,
    /// Elements whose markup hints at a price, read when the text scan finds nothing
    pub price_hints: Vec<String>,
    /// Element whose visible text is scanned for a price
    pub body: String,
}

impl Default for GenericPageSelectors {
    fn default() -> Self {
        Self {
            title: strings(&["meta[property='og:title']", "title", "h1"]),
            image: strings(&["meta[property='og:image']", "meta[name='twitter:image']"]),
            price_meta: strings(&[
                "meta[property='product:price:amount']",
                "meta[itemprop='price']",
            ]),
            price_hints: strings(&[
                "[itemprop='price']",
                "[class*='price']",
                "[class*='Price']",
                "[id*='price']",
            ]),
            body: "body".to_string(),
        }
    }
}

/// Built-in shop profiles, in match order.
pub fn builtin_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            name: "GS Store".to_string(),
            domain_pattern: "gsstore".to_string(),
            list_page: Some(ListPageSelectors {
                card: strings(&[".product-item"]),
                link: strings(&["a"]),
                name: strings(&[".product-name"]),
                price: strings(&[".product-price .new-price", ".product-price"]),
                image: default_card_image(),
                max_cards: default_max_cards(),
            }),
            single_page: Some(SinglePageSelectors::default()),
            fallback_name: "GS Store product".to_string(),
        },
        SiteProfile {
            name: "Saat&Saat".to_string(),
            domain_pattern: "saatvesaat".to_string(),
            list_page: Some(ListPageSelectors {
                card: strings(&[
                    ".product-item",
                    ".product-item-info",
                    ".product-card",
                    "[class*='product-item']",
                    "[class*='ProductItem']",
                    ".item.product",
                ]),
                link: strings(&[
                    "a.product-item-link",
                    "a[class*='product-name']",
                    "a[class*='ProductName']",
                    "a.product-link",
                    ".product-name a",
                    "a[href*='/p-']",
                ]),
                name: strings(&[".product-item-name", ".product-name"]),
                price: strings(&[
                    ".special-price .price",
                    ".price-box .price",
                    "[class*='special-price']",
                    "[class*='Price']",
                    ".price",
                    "[data-price-amount]",
                ]),
                image: default_card_image(),
                max_cards: default_max_cards(),
            }),
            single_page: Some(SinglePageSelectors::default()),
            fallback_name: "Saat&Saat product".to_string(),
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_builtin_selectors_compile() {
        let mut all = Vec::new();
        for profile in builtin_profiles() {
            if let Some(list) = profile.list_page {
                all.extend(list.card);
                all.extend(list.link);
                all.extend(list.name);
                all.extend(list.price);
                all.extend(list.image);
            }
            if let Some(single) = profile.single_page {
                all.extend(single.price);
                all.extend(single.title);
                all.extend(single.image);
            }
        }
        let generic = GenericPageSelectors::default();
        all.extend(generic.title);
        all.extend(generic.image);
        all.extend(generic.price_meta);
        all.extend(generic.price_hints);

        for selector in all {
            assert!(Selector::parse(&selector).is_ok(), "selector failed: {selector}");
        }
    }

    #[test]
    fn test_profile_defaults_when_deserializing() {
        let json = r#"{"name":"Shop","domain_pattern":"shop.example"}"#;
        let profile: SiteProfile = serde_json::from_str(json).unwrap();

        assert!(profile.list_page.is_none());
        assert_eq!(profile.fallback_name, "Unnamed product");
    }

    #[test]
    fn test_meta_hint_detection() {
        assert!(is_meta_hint("meta[property='og:title']"));
        assert!(!is_meta_hint("h1.page-title"));
    }
}
