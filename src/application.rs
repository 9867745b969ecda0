//! Application layer
//!
//! Use cases that drive one tracking run: command intake first, then the
//! price-checking cycle over the resulting target list.

pub mod command_intake;
pub mod price_tracker;

pub use command_intake::{CommandIntake, IntakeReport};
pub use price_tracker::{CycleReport, PriceTracker, TrackerSettings};
