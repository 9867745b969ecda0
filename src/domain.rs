//! Domain module - tracked products, the price ledger and inbound commands
//!
//! Each module is its own file in the domain/ directory; the commonly used
//! items are re-exported here for convenience.

pub mod command;
pub mod ledger;
pub mod product;
pub mod target;

pub use command::{InboundCommand, TrackerCommand};
pub use ledger::{DropAlert, Ledger, PriceChange, PricePolicy};
pub use product::{ExtractedProduct, ProductRecord};
pub use target::{TargetList, is_trackable_url};
