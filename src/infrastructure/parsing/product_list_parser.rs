//! Product list parser
//!
//! Category and search pages repeat one card per product. Cards are located
//! with the first fingerprint that matches anything; each card is read on its
//! own so a broken card never costs the rest of the page.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::config::ListPageSelectors;
use super::context::ExtractionContext;
use super::fields::{self, IMAGE_ATTRIBUTES, PriceReading, Scope, clean_name};
use super::price::find_price;
use crate::domain::ExtractedProduct;
use crate::infrastructure::browser::{BrowserDriver, ElementHandle, PageHandle};
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};

/// Link texts this short are icons or "Buy" buttons, not names.
const MIN_LINK_NAME_CHARS: usize = 4;

pub struct ProductListParser {
    selectors: ListPageSelectors,
}

struct CardLink {
    text: Option<String>,
    href: Option<String>,
}

impl ProductListParser {
    pub fn new(selectors: ListPageSelectors) -> Self {
        Self { selectors }
    }

    pub async fn parse(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Vec<ExtractedProduct>> {
        let Some(cards) = self.find_cards(browser, page, ctx).await? else {
            debug!("No product cards on {}", ctx.target_url);
            return Ok(Vec::new());
        };

        let mut products = Vec::new();
        let mut seen = HashSet::new();
        for (index, card) in cards.into_iter().take(self.selectors.max_cards).enumerate() {
            match self.extract_card(browser, card, ctx).await {
                Ok(Some(product)) => {
                    if seen.insert(product.url.clone()) {
                        products.push(product);
                    }
                }
                Ok(None) => debug!("Card {} on {} has no usable price", index, ctx.target_url),
                Err(e) => warn!("Skipping card {} on {}: {}", index, ctx.target_url, e),
            }
        }

        debug!("Extracted {} products from {}", products.len(), ctx.target_url);
        Ok(products)
    }

    /// Cards matched by the first productive fingerprint.
    async fn find_cards(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Option<Vec<ElementHandle>>> {
        for fingerprint in &self.selectors.card {
            let cards = fields::select(browser, Scope::Page(page), fingerprint).await?;
            if !cards.is_empty() {
                debug!(
                    "Found {} product cards using '{}' on {}",
                    cards.len(),
                    fingerprint,
                    ctx.target_url
                );
                return Ok(Some(cards));
            }
        }
        Ok(None)
    }

    async fn extract_card(
        &self,
        browser: &dyn BrowserDriver,
        card: ElementHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Option<ExtractedProduct>> {
        let scope = Scope::Element(card);

        let link = self.find_link(browser, card).await?;
        let href = link
            .href
            .ok_or_else(|| ExtractionError::required_field_missing("link", Some("product card")))?;
        let url = ctx.resolve_url(&href)?;

        let reading = match fields::first_price(browser, scope, &self.selectors.price, None, 1).await? {
            Some(reading) => reading,
            None => {
                let card_text = browser.read_text(card).await?;
                match find_price(&card_text, Some(&ctx.bounds)) {
                    Some(found) => PriceReading::from(found),
                    None => return Ok(None),
                }
            }
        };

        let name = match link
            .text
            .filter(|text| text.chars().count() >= MIN_LINK_NAME_CHARS)
        {
            Some(text) => Some(text),
            None => fields::first_text(browser, scope, &self.selectors.name).await?,
        };
        let name = clean_name(
            name.as_deref().unwrap_or_default(),
            &reading.literals,
            &ctx.fallback_name,
        );

        let image = fields::first_attribute(browser, scope, &self.selectors.image, IMAGE_ATTRIBUTES)
            .await?
            .and_then(|src| ctx.resolve_url(&src).ok());

        Ok(Some(ExtractedProduct::new(name, url, reading.value).with_image(image)))
    }

    /// First element matched by the first productive link selector.
    async fn find_link(
        &self,
        browser: &dyn BrowserDriver,
        card: ElementHandle,
    ) -> ExtractionResult<CardLink> {
        for hint in &self.selectors.link {
            let Some(element) = fields::select(browser, Scope::Element(card), hint)
                .await?
                .into_iter()
                .next()
            else {
                continue;
            };
            let text = browser.read_text(element).await?;
            let href = browser.read_attribute(element, "href").await?;
            return Ok(CardLink {
                text: Some(text.trim().to_string()).filter(|t| !t.is_empty()),
                href: href.filter(|h| !h.trim().is_empty()),
            });
        }
        Ok(CardLink {
            text: None,
            href: None,
        })
    }
}
