//! Ordered extraction strategies
//!
//! A chain runs its strategies in order and stops at the first one that finds
//! at least one product. Failures are typed outcomes, never panics or silent
//! empties, so the caller can tell "nothing here" from "try again later".

use std::time::Duration;

use tracing::{debug, warn};

use super::config::{GenericPageSelectors, SiteProfile};
use super::context::ExtractionContext;
use super::generic_page_parser::GenericPageParser;
use super::product_detail_parser::ProductDetailParser;
use super::product_list_parser::ProductListParser;
use crate::domain::ExtractedProduct;
use crate::infrastructure::browser::{BrowserDriver, BrowserResult, PageHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Found(Vec<ExtractedProduct>),
    NoCandidates,
    TransientFailure(String),
}

pub enum ExtractionStrategy {
    ListPage(ProductListParser),
    SinglePage(ProductDetailParser),
    Generic(GenericPageParser),
}

impl ExtractionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPage(_) => "list_page",
            Self::SinglePage(_) => "single_page",
            Self::Generic(_) => "generic",
        }
    }

    pub async fn try_extract(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> StrategyOutcome {
        let result = match self {
            Self::ListPage(parser) => parser.parse(browser, page, ctx).await,
            Self::SinglePage(parser) => parser.parse(browser, page, ctx).await,
            Self::Generic(parser) => parser.parse(browser, page, ctx).await,
        };

        match result {
            Ok(products) if products.is_empty() => StrategyOutcome::NoCandidates,
            Ok(products) => StrategyOutcome::Found(products),
            Err(e) if e.is_transient() => StrategyOutcome::TransientFailure(e.to_string()),
            Err(e) => {
                debug!("Strategy '{}' gave up on {}: {}", self.name(), ctx.target_url, e);
                StrategyOutcome::NoCandidates
            }
        }
    }
}

/// Scrolling done before extraction so lazily loaded cards render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub max_iterations: u32,
    pub settle: Duration,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            max_iterations: crate::infrastructure::config::defaults::MAX_SCROLL_ITERATIONS,
            settle: Duration::from_millis(crate::infrastructure::config::defaults::SCROLL_SETTLE_MS),
        }
    }
}

impl ScrollPolicy {
    /// Scroll until the page stops growing. Returns the iterations used.
    pub async fn load_lazy_content(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
    ) -> BrowserResult<u32> {
        let mut last_height = browser.current_height(page).await?;
        for iteration in 1..=self.max_iterations {
            browser.scroll_to_bottom(page).await?;
            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }
            let height = browser.current_height(page).await?;
            if height == last_height {
                return Ok(iteration);
            }
            last_height = height;
        }
        Ok(self.max_iterations)
    }
}

pub struct StrategyChain {
    name: String,
    fallback_name: String,
    strategies: Vec<ExtractionStrategy>,
    scroll: ScrollPolicy,
}

impl StrategyChain {
    pub fn new(name: impl Into<String>, strategies: Vec<ExtractionStrategy>) -> Self {
        Self {
            name: name.into(),
            fallback_name: "Unnamed product".to_string(),
            strategies,
            scroll: ScrollPolicy::default(),
        }
    }

    /// The site-agnostic chain used when no profile matches.
    pub fn generic(selectors: GenericPageSelectors) -> Self {
        Self::new(
            "generic",
            vec![ExtractionStrategy::Generic(GenericPageParser::new(selectors))],
        )
    }

    /// List page first, then single page. A profile with neither falls back
    /// to the generic strategy.
    pub fn from_profile(profile: &SiteProfile) -> Self {
        let mut strategies = Vec::new();
        if let Some(list) = &profile.list_page {
            strategies.push(ExtractionStrategy::ListPage(ProductListParser::new(list.clone())));
        }
        if let Some(single) = &profile.single_page {
            strategies.push(ExtractionStrategy::SinglePage(ProductDetailParser::new(
                single.clone(),
            )));
        }
        if strategies.is_empty() {
            strategies.push(ExtractionStrategy::Generic(GenericPageParser::new(
                GenericPageSelectors::default(),
            )));
        }
        Self::new(profile.name.clone(), strategies).with_fallback_name(profile.fallback_name.clone())
    }

    #[must_use]
    pub fn with_scroll(mut self, scroll: ScrollPolicy) -> Self {
        self.scroll = scroll;
        self
    }

    #[must_use]
    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fallback_name(&self) -> &str {
        &self.fallback_name
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(ExtractionStrategy::name).collect()
    }

    pub async fn extract(
        &self,
        browser: &dyn BrowserDriver,
        page: PageHandle,
        ctx: &ExtractionContext,
    ) -> StrategyOutcome {
        match self.scroll.load_lazy_content(browser, page).await {
            Ok(iterations) => debug!("Scrolled {} in {} iteration(s)", ctx.target_url, iterations),
            Err(e) => warn!("Scrolling {} failed, extracting anyway: {}", ctx.target_url, e),
        }

        let mut failure = None;
        for strategy in &self.strategies {
            match strategy.try_extract(browser, page, ctx).await {
                StrategyOutcome::Found(products) => {
                    debug!(
                        "Chain '{}' strategy '{}' found {} product(s) on {}",
                        self.name,
                        strategy.name(),
                        products.len(),
                        ctx.target_url
                    );
                    return StrategyOutcome::Found(products);
                }
                StrategyOutcome::NoCandidates => {
                    debug!("Strategy '{}' found nothing on {}", strategy.name(), ctx.target_url);
                }
                StrategyOutcome::TransientFailure(reason) => {
                    warn!("Strategy '{}' failed on {}: {}", strategy.name(), ctx.target_url, reason);
                    failure.get_or_insert(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        failure.map_or(StrategyOutcome::NoCandidates, StrategyOutcome::TransientFailure)
    }
}
