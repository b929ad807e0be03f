//! Buyer-side records.
//!
//! Filling a proof moves the name out of the seller's lock script with a
//! `TRANSFER` that still points at the lock script (the covenant names the
//! buyer). After the transfer lockup the buyer finalizes it, which is when
//! the name actually lands in the buyer's wallet.

use serde::{Deserialize, Serialize};

use crate::chain::TxHash;
use crate::context::Context;
use crate::crypto::LockPublicKey;
use crate::error::ServiceError;
use crate::lock::{Confirmation, LockupConfirmation};

/// A broadcast fill of someone else's swap proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFill {
    pub name: String,
    pub fulfillment_tx_hash: TxHash,
    /// Needed later to reproduce the lock script when finalizing.
    pub locking_public_key: LockPublicKey,
    pub price: u64,
    #[serde(default)]
    pub fee: u64,
    pub broadcast_at: u64,
}

impl SwapFill {
    pub async fn confirmation_details(&self, ctx: &Context) -> Result<LockupConfirmation, ServiceError> {
        LockupConfirmation::fetch(ctx, &self.fulfillment_tx_hash).await
    }
}

/// A broadcast finalize of a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFinalize {
    pub name: String,
    pub finalize_tx_hash: TxHash,
    pub broadcast_at: u64,
}

impl SwapFinalize {
    pub async fn confirmation_details(&self, ctx: &Context) -> Result<Confirmation, ServiceError> {
        Confirmation::fetch(ctx, &self.finalize_tx_hash).await
    }
}
