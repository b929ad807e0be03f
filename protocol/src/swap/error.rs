//! Error types for swap operations.
//!
//! Note what is NOT here: "this proof is invalid". An invalid proof is an
//! expected answer, reported as [`Verification::Invalid`](super::Verification)
//! rather than an error. The variants below are for operations that cannot
//! proceed at all.

use thiserror::Error;

use super::proof::InvalidReason;
use crate::auction::AuctionFormatError;
use crate::chain::{CovenantKind, Outpoint, TxHash};
use crate::error::{ServiceError, ValidationError};
use crate::script::ScriptError;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Format(#[from] AuctionFormatError),

    /// The coin an operation needs is gone (spent) or never existed.
    #[error("coin {outpoint} not found; it may already be spent")]
    CoinNotFound { outpoint: Outpoint },

    /// The coin carries the wrong covenant for this step.
    #[error("coin {outpoint} has covenant {found}, expected {expected}")]
    UnexpectedCovenant {
        outpoint: Outpoint,
        expected: CovenantKind,
        found: CovenantKind,
    },

    /// A name covenant is missing items or carries garbage.
    #[error("coin {outpoint} has a malformed {kind} covenant")]
    MalformedCovenant { outpoint: Outpoint, kind: CovenantKind },

    /// The ledger does not know this name.
    #[error("name {0:?} is not registered on the ledger")]
    NameNotFound(String),

    #[error("transaction {0} not found")]
    TransactionNotFound(TxHash),

    #[error("transaction {0} is not confirmed yet")]
    Unconfirmed(TxHash),

    #[error("transaction {0} has no TRANSFER output")]
    NoTransferOutput(TxHash),

    #[error("transaction {0} has no FINALIZE output")]
    NoFinalizeOutput(TxHash),

    #[error("block at height {0} not found")]
    BlockNotFound(u32),

    /// The signing key does not match the proof's public key.
    #[error("signing key does not match the proof's public key")]
    KeyMismatch,

    /// Funding dropped or rewrote an input or output the swap depends on.
    #[error("funded transaction lost its {0}")]
    FundingLayout(&'static str),

    /// A proof was rejected before filling.
    #[error("swap proof is invalid: {0}")]
    InvalidProof(InvalidReason),

    /// The locked input no longer validates after funding. Broadcasting would
    /// be rejected by the ledger.
    #[error("sanity check on the locked input failed: {0}")]
    SanityCheck(ScriptError),

    /// A freshly produced signature does not verify. This is a bug, not a
    /// user error.
    #[error("signature failed self-verification: {0}")]
    SelfCheck(InvalidReason),
}
