//! # Auction Container
//!
//! A signed auction is a bag of swap proofs that share everything except
//! price, lock time, fee and signature. Storing the shared part once keeps
//! auction files small; [`Auction::to_swap_proof`] reassembles any single
//! proof on demand.
//!
//! Entries are kept sorted by price, highest first. Since lock times rise as
//! prices fall, "the best bid right now" is simply the last entry whose lock
//! time has passed.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::{validate_name, Address, Outpoint, TxHash};
use crate::config::CURRENT_AUCTION_VERSION;
use crate::context::Context;
use crate::crypto::LockPublicKey;
use crate::error::{ServiceError, ValidationError};
use crate::swap::{InvalidReason, SwapProof, SwapProofBuilder, Verification};

/// The per-tick part of a swap proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEntry {
    pub price: u64,
    pub lock_time: u32,
    /// Absent in files from marketplaces that never charged a fee.
    #[serde(default)]
    pub fee: u64,
    /// `signature || sighash type`.
    #[serde(with = "crate::chain::address::hex_bytes")]
    pub signature: Vec<u8>,
}

/// Outcome of checking every proof in an auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchVerification {
    AllValid,
    /// The first proof that failed. Later proofs were not checked.
    Invalid { index: usize, reason: InvalidReason },
    /// The progress callback asked to stop after `checked` proofs.
    Aborted { checked: usize },
}

impl BatchVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, BatchVerification::AllValid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auction {
    version: u64,
    name: String,
    locking: Outpoint,
    public_key: LockPublicKey,
    payment_addr: Address,
    fee_addr: Option<Address>,
    data: Vec<AuctionEntry>,
}

impl Auction {
    /// Assemble an auction, sorting `data` by descending price.
    pub fn new(
        name: impl Into<String>,
        locking: Outpoint,
        public_key: LockPublicKey,
        payment_addr: Address,
        fee_addr: Option<Address>,
        mut data: Vec<AuctionEntry>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name(&name)?;
        for entry in &data {
            if entry.price == 0 {
                return Err(ValidationError::ZeroPrice);
            }
            if entry.fee > 0 && fee_addr.is_none() {
                return Err(ValidationError::MissingFeeAddress);
            }
        }
        data.sort_by(|a, b| b.price.cmp(&a.price));

        Ok(Self {
            version: CURRENT_AUCTION_VERSION,
            name,
            locking,
            public_key,
            payment_addr,
            fee_addr,
            data,
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outpoint(&self) -> Outpoint {
        self.locking
    }

    pub fn locking_tx_hash(&self) -> TxHash {
        self.locking.hash
    }

    pub fn locking_output_idx(&self) -> u32 {
        self.locking.index
    }

    pub fn public_key(&self) -> &LockPublicKey {
        &self.public_key
    }

    pub fn payment_addr(&self) -> &Address {
        &self.payment_addr
    }

    pub fn fee_addr(&self) -> Option<&Address> {
        self.fee_addr.as_ref()
    }

    /// Entries, highest price first.
    pub fn data(&self) -> &[AuctionEntry] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // -- Bidding ------------------------------------------------------------

    /// The cheapest entry whose lock time is at or before `time`, with its
    /// index. `None` if nothing has unlocked yet.
    pub fn best_bid_at(&self, time: u64) -> Option<(usize, &AuctionEntry)> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, e)| u64::from(e.lock_time) <= time)
            .last()
    }

    /// [`best_bid_at`](Self::best_bid_at) the ledger's current median time.
    pub async fn best_bid_now(
        &self,
        ctx: &Context,
    ) -> Result<Option<(usize, &AuctionEntry)>, ServiceError> {
        let now = ctx.ledger().get_median_time().await?;
        Ok(self.best_bid_at(now))
    }

    /// Rebuild the full swap proof for entry `index`.
    pub fn to_swap_proof(&self, index: usize) -> Result<SwapProof, ValidationError> {
        let entry = self
            .data
            .get(index)
            .ok_or(ValidationError::ProofIndexOutOfRange {
                index,
                len: self.data.len(),
            })?;
        SwapProofBuilder::new(
            self.name.clone(),
            self.locking,
            self.public_key.clone(),
            self.payment_addr.clone(),
        )
        .price(entry.price)
        .lock_time(entry.lock_time)
        .fee(entry.fee, self.fee_addr.clone())
        .signature(Some(entry.signature.clone()))
        .build()
    }

    // -- Ledger Checks ------------------------------------------------------

    /// Verify every proof, stopping at the first failure.
    ///
    /// `on_progress(checked, total)` runs after each proof and can return
    /// `ControlFlow::Break(())` to stop early. The locked coin is fetched
    /// once for the whole batch.
    pub async fn verify_proofs<F>(
        &self,
        ctx: &Context,
        mut on_progress: F,
    ) -> Result<BatchVerification, ServiceError>
    where
        F: FnMut(usize, usize) -> ControlFlow<()>,
    {
        let coin = ctx.ledger().get_coin(&self.locking).await?;
        let total = self.data.len();

        for index in 0..total {
            let verification = match self.to_swap_proof(index) {
                Ok(proof) => proof.verify_against(coin.as_ref()),
                Err(e) => Verification::Invalid(InvalidReason::Malformed(e)),
            };
            if let Verification::Invalid(reason) = verification {
                debug!(name = %self.name, index, %reason, "auction proof failed verification");
                return Ok(BatchVerification::Invalid { index, reason });
            }
            if on_progress(index + 1, total).is_break() {
                return Ok(BatchVerification::Aborted { checked: index + 1 });
            }
        }
        Ok(BatchVerification::AllValid)
    }

    /// `true` once the locked coin is gone, i.e. some proof was filled (or
    /// the seller cancelled).
    pub async fn is_fulfilled(&self, ctx: &Context) -> Result<bool, ServiceError> {
        Ok(ctx.ledger().get_coin(&self.locking).await?.is_none())
    }
}
