//! Product detail parser
//!
//! A detail page describes exactly one product; its identity is the target
//! url itself.

use tracing::debug;

use super::config::SinglePageSelectors;
use super::context::ExtractionContext;
use super::fields::{self, IMAGE_ATTRIBUTES, Scope, clean_name};
use crate::domain::ExtractedProduct;
use crate::infrastructure::browser::{BrowserDriver, PageHandle};
use crate::infrastructure::parsing_error::ExtractionResult;

pub struct ProductDetailParser {
    selectors: SinglePageSelectors,
}

impl ProductDetailParser {
    pub fn new(selectors: SinglePageSelectors) -> Self {
        Self { selectors }
    }

    pub async fn parse(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> ExtractionResult<Vec<ExtractedProduct>> {
        let scope = Scope::Page(page);

        let Some(price) =
            fields::first_price(browser, scope, &self.selectors.price, None, 1).await?
        else {
            debug!("No price on detail page {}", ctx.target_url);
            return Ok(Vec::new());
        };

        let title = fields::first_text(browser, scope, &self.selectors.title).await?;
        let name = clean_name(
            title.as_deref().unwrap_or_default(),
            &price.literals,
            &ctx.fallback_name,
        );

        let image = fields::first_attribute(browser, scope, &self.selectors.image, IMAGE_ATTRIBUTES)
            .await?
            .and_then(|src| ctx.resolve_url(&src).ok());

        Ok(vec![
            ExtractedProduct::new(name, ctx.target_url.clone(), price.value).with_image(image),
        ])
    }
}
