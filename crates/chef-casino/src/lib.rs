#![deny(warnings)]

//! Case openings and the collectible inventory.

pub mod ledger;
pub mod unboxing;

pub use ledger::{cook, sell, sell_all, total_value, valuation_of};
pub use unboxing::{generate_reel, Reveal, UnboxingEngine};
