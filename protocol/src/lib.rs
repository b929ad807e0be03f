//! # Namedex Protocol: Core Library
//!
//! Trustless Dutch auctions for on-chain names. A seller parks a name in a
//! tiny covenant-gated lock script and hands out a stack of pre-signed,
//! time-locked partial transactions ("swap proofs"), one per price step.
//! A buyer picks whichever proof has unlocked, adds the money, and
//! broadcasts. No escrow, no custodian, no trusting anyone's server.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and per-network parameters.
//! - **crypto**: Ed25519 lock keys and the hash functions the ledger uses.
//! - **chain**: Names, addresses, covenants, transactions, signature hashes.
//! - **script**: The lock script and a small interpreter to check it.
//! - **context**: Ledger and wallet collaborators, injected, never global.
//! - **swap**: Swap proofs: build, sign, verify, fill; finalize builder.
//! - **auction**: Price schedules, auction factory, container, file format.
//! - **lock**: Seller lifecycle records and their confirmation status.
//! - **marketplace**: Fee lookup and auction upload against a marketplace API.
//! - **service**: The seller and buyer operations, end to end.
//! - **storage**: Versioned local records and derived name states.
//!
//! ## Design Philosophy
//!
//! 1. The ledger is the only referee. Every proof is re-verified against
//!    current ledger state; nothing is trusted because we signed it earlier.
//! 2. An invalid proof is an answer, not an error.
//! 3. No retries inside the library. Waiting for blocks is the caller's job.
//! 4. If it touches someone's name, it has tests. Plural.

pub mod auction;
pub mod chain;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod lock;
pub mod marketplace;
pub mod script;
pub mod service;
pub mod storage;
pub mod swap;

pub use auction::{Auction, AuctionFactory, AuctionParams};
pub use config::Network;
pub use context::{Context, LedgerService, WalletService};
pub use error::{ServiceError, ValidationError};
pub use marketplace::{HttpMarketplace, MarketplaceService};
pub use swap::{SwapError, SwapProof, Verification};
