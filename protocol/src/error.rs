//! Crate-wide error types shared by every protocol module.
//!
//! Two families live here because nearly every module touches them:
//!
//! - [`ValidationError`] -- somebody handed us bad parameters. Fail fast at
//!   construction, never coerce.
//! - [`ServiceError`] -- a collaborator (ledger node, wallet) failed. We never
//!   retry; the caller decides whether to try again.
//!
//! Module-specific failures (script evaluation, swap operations, transport
//! files, storage) have their own enums next to the code that raises them.

use thiserror::Error;

/// Malformed construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The name violates the ledger's name rules.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Prices must be strictly positive.
    #[error("invalid price: must be > 0")]
    ZeroPrice,

    /// Fee rates are basis points in `0..=10_000`.
    #[error("invalid fee rate {0}: must be between 0 and 10000")]
    InvalidFeeRate(u64),

    /// A non-zero fee needs somewhere to go.
    #[error("a fee address is required when the fee rate or fee is non-zero")]
    MissingFeeAddress,

    /// The auction must end after it starts.
    #[error("invalid auction window: end time {end} must be after start time {start}")]
    InvalidTimeRange { start: u64, end: u64 },

    /// Prices must descend to a positive floor.
    #[error("invalid price range: start price {start} must exceed end price {end}, which must be > 0")]
    InvalidPriceRange { start: u64, end: u64 },

    /// Lock times are u32 seconds on the ledger.
    #[error("invalid lock time {0}: must fit in 32 bits")]
    InvalidLockTime(u64),

    /// A zero step duration would produce infinitely many ticks.
    #[error("step duration must be > 0")]
    ZeroStepDuration,

    /// At least two ticks are needed to derive a price decrement.
    #[error("auction window yields {steps} price step(s); at least 2 are required")]
    TooFewSteps { steps: u64 },

    /// The price spread is too narrow for every step to lower the price.
    #[error("price spread {spread} is too small for {steps} strictly decreasing steps")]
    PriceSpreadTooSmall { spread: u64, steps: u64 },

    /// No reduction strategy is registered under this name.
    #[error("invalid reduction strategy: {0:?}")]
    UnknownStrategy(String),

    /// An auction has no proof at this index.
    #[error("proof index {index} out of range for auction with {len} proofs")]
    ProofIndexOutOfRange { index: usize, len: usize },

    /// Unrecognized network name.
    #[error("unknown network: {0:?}")]
    UnknownNetwork(String),

    /// A hex field did not decode.
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    /// An address string did not decode for the expected network.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Public key bytes are not a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Secret key bytes have the wrong length.
    #[error("invalid secret key")]
    InvalidSecretKey,
}

/// Failures of the external collaborators.
///
/// "Not found" is NOT an error at this layer: ledger lookups return `Ok(None)`
/// for absent coins and transactions, so callers can tell "already spent"
/// apart from "the node is down".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The ledger node could not answer the query.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// The wallet could not fund, sign, or derive.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// The ledger refused to accept a broadcast transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The marketplace API could not be reached or answered with an error.
    #[error("marketplace error: {0}")]
    Marketplace(String),
}
