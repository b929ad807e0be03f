//! # Dutch Auctions
//!
//! A seller lists a locked name at a price that starts high and falls on a
//! schedule. Each scheduled (price, time) pair becomes its own signed swap
//! proof; buyers watch the clock and fill the first one they like.
//!
//! - [`strategy`]: how prices fall
//! - [`factory`]: parameter validation and proof signing
//! - [`container`]: the signed auction and best-bid lookups
//! - [`format`]: the versioned JSON file sellers hand out

pub mod container;
pub mod factory;
pub mod format;
pub mod strategy;

pub use container::{Auction, AuctionEntry, BatchVerification};
pub use factory::{AuctionFactory, AuctionParams};
pub use format::AuctionFormatError;
pub use strategy::{
    LinearSchedule, PriceTick, ReductionStrategy, ScheduleParams, StrategyFn, StrategyRegistry,
};
