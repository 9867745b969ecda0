//! Product extraction
//!
//! Turns a rendered page into product records. Site profiles supply ordered
//! selector fallbacks; [`SiteDispatcher`] picks the strategy chain for a url
//! and the chain runs its strategies until one finds something.

pub mod config;
pub mod context;
pub mod fields;
pub mod generic_page_parser;
pub mod price;
pub mod product_detail_parser;
pub mod product_list_parser;
pub mod site_dispatcher;
pub mod strategy;

pub use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
pub use config::{GenericPageSelectors, ListPageSelectors, SinglePageSelectors, SiteProfile};
pub use context::ExtractionContext;
pub use generic_page_parser::GenericPageParser;
pub use price::{PriceBounds, normalize_price, scan_for_price};
pub use product_detail_parser::ProductDetailParser;
pub use product_list_parser::ProductListParser;
pub use site_dispatcher::{Dispatch, SiteDispatcher};
pub use strategy::{ExtractionStrategy, ScrollPolicy, StrategyChain, StrategyOutcome};
