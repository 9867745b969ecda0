//! Site-agnostic extraction for pages no profile knows about

use tracing::debug;

use super::config::GenericPageSelectors;
use super::context::ExtractionContext;
use super::fields::{self, PriceReading, Scope, clean_name};
use super::price::find_price;
use crate::domain::ExtractedProduct;
use crate::infrastructure::browser::{BrowserDriver, PageHandle};
use crate::infrastructure::parsing_error::ExtractionResult;

/// Elements read per price-hint selector.
const HINT_ELEMENTS_PER_SELECTOR: usize = 20;

pub struct GenericPageParser {
    selectors: GenericPageSelectors,
}

impl GenericPageParser {
    pub fn new(selectors: GenericPageSelectors) -> Self {
        Self { selectors }
    }

    pub async fn parse(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Vec<ExtractedProduct>> {
        let Some(price) = self.find_price(browser, page, ctx).await? else {
            debug!("Generic strategy found no price on {}", ctx.target_url);
            return Ok(Vec::new());
        };

        let scope = Scope::Page(page);
        let title = fields::first_text(browser, scope, &self.selectors.title).await?;
        let name = clean_name(
            title.as_deref().unwrap_or_default(),
            &price.literals,
            &ctx.fallback_name,
        );
        let image = fields::first_attribute(browser, scope, &self.selectors.image, &["content", "src"])
            .await?
            .and_then(|src| ctx.resolve_url(&src).ok());

        Ok(vec![
            ExtractedProduct::new(name, ctx.target_url.clone(), price.value).with_image(image),
        ])
    }

    /// Metadata first, then the visible body text, then price-looking elements.
    async fn find_price(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Option<PriceReading>> {
        let scope = Scope::Page(page);

        if let Some(reading) =
            fields::first_price(browser, scope, &self.selectors.price_meta, None, 1).await?
        {
            return Ok(Some(reading));
        }

        if let Some(body) = fields::select(browser, scope, &self.selectors.body)
            .await?
            .into_iter()
            .next()
        {
            let text = browser.read_text(body).await?;
            let prefix: String = text.chars().take(ctx.text_scan_limit).collect();
            if let Some(found) = find_price(&prefix, Some(&ctx.bounds)) {
                return Ok(Some(found.into()));
            }
        }

        fields::first_price(
            browser,
            scope,
            &self.selectors.price_hints,
            Some(&ctx.bounds),
            HINT_ELEMENTS_PER_SELECTOR,
        )
        .await
    }
}
