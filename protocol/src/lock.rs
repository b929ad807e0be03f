//! # Name Lock Lifecycle Records
//!
//! A seller's listing moves through a handful of on-chain steps, and each
//! step leaves behind a small record: which transaction did it, and (for the
//! steps that own one) the lock key. Records are immutable once written; the
//! next step writes a new record rather than editing the old one.
//!
//! ```text
//! ExternalTransfer ─┐
//!                   ├─> Finalize ──> (auction) ──> CancelTransfer ──> CancelFinalize
//! Transfer ─────────┘
//! ```
//!
//! Every record can ask the ledger how far along it is. "Not found" and
//! "unconfirmed" are both reported as unconfirmed, never as errors.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chain::{Address, CovenantKind, Outpoint, TxHash};
use crate::context::Context;
use crate::crypto::keys::secret_hex;
use crate::crypto::{LockKeypair, LockPublicKey};
use crate::error::ServiceError;
use crate::script::lock_script_address;

/// Current wall-clock time in Unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Confirmation Details
// ---------------------------------------------------------------------------

/// Confirmation status of a step that has no lockup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    /// Block time in Unix milliseconds, `None` while unconfirmed.
    pub confirmed_at: Option<u64>,
}

/// Confirmation status of a `TRANSFER`, which must wait out the network's
/// transfer lockup before it can be finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockupConfirmation {
    pub confirmed_at: Option<u64>,
    /// `true` once `chain height - confirmation height > transfer lockup`.
    pub spendable: bool,
    /// Blocks left until spendable, `None` while unconfirmed.
    pub spendable_in: Option<u32>,
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub(crate) async fn fetch(ctx: &Context, hash: &TxHash) -> Result<Self, ServiceError> {
        let record = ctx.ledger().get_transaction(hash).await?;
        let confirmed_at = record
            .filter(|r| r.height.is_some())
            .map(|r| r.mtime * 1_000);
        Ok(Self { confirmed_at })
    }
}

impl LockupConfirmation {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub(crate) async fn fetch(ctx: &Context, hash: &TxHash) -> Result<Self, ServiceError> {
        let ledger = ctx.ledger();
        let confirmed = ledger
            .get_transaction(hash)
            .await?
            .and_then(|r| r.height.map(|h| (h, r.mtime)));

        let Some((height, mtime)) = confirmed else {
            return Ok(Self {
                confirmed_at: None,
                spendable: false,
                spendable_in: None,
            });
        };

        let tip = ledger.get_chain_height().await?;
        let depth = tip.saturating_sub(height);
        let lockup = ctx.network().transfer_lockup();
        Ok(Self {
            confirmed_at: Some(mtime * 1_000),
            spendable: depth > lockup,
            spendable_in: Some(lockup.saturating_sub(depth)),
        })
    }
}

// ---------------------------------------------------------------------------
// Lock: Transfer & Finalize
// ---------------------------------------------------------------------------

/// The seller's wallet sent the name to a fresh lock script address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameLockTransfer {
    pub name: String,
    pub transfer_tx_hash: TxHash,
    pub transfer_output_idx: u32,
    #[serde(with = "secret_hex")]
    pub private_key: LockKeypair,
    /// Unix milliseconds.
    pub broadcast_at: u64,
}

impl NameLockTransfer {
    pub fn public_key(&self) -> LockPublicKey {
        self.private_key.public_key()
    }

    pub fn lock_script_address(&self) -> Address {
        lock_script_address(&self.public_key())
    }

    pub async fn confirmation_details(&self, ctx: &Context) -> Result<LockupConfirmation, ServiceError> {
        LockupConfirmation::fetch(ctx, &self.transfer_tx_hash).await
    }
}

/// The transfer into the lock script was finalized. The name now sits in
/// the lock script under a `FINALIZE` covenant, ready for swap proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameLockFinalize {
    pub name: String,
    pub finalize_tx_hash: TxHash,
    pub finalize_output_idx: u32,
    #[serde(with = "secret_hex")]
    pub private_key: LockKeypair,
    pub broadcast_at: u64,
}

impl NameLockFinalize {
    pub fn public_key(&self) -> LockPublicKey {
        self.private_key.public_key()
    }

    /// The locked coin swap proofs spend.
    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.finalize_tx_hash, self.finalize_output_idx)
    }

    pub async fn confirmation_details(&self, ctx: &Context) -> Result<Confirmation, ServiceError> {
        Confirmation::fetch(ctx, &self.finalize_tx_hash).await
    }
}

// ---------------------------------------------------------------------------
// Lock: External Transfer
// ---------------------------------------------------------------------------

/// A lock whose transfer and finalize are done by someone else (another
/// wallet, an exchange). We only know the key, so we find the locked coin by
/// scanning the lock address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameLockExternalTransfer {
    pub name: String,
    #[serde(with = "secret_hex")]
    pub private_key: LockKeypair,
    pub created_at: u64,
}

/// Where an external lock stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalConfirmation {
    /// No finalized coin for the name at the lock address yet.
    Waiting,
    /// The name is finalized into the lock script.
    #[serde(rename_all = "camelCase")]
    Confirmed {
        confirmed_at: u64,
        finalize_tx_hash: TxHash,
        finalize_output_idx: u32,
    },
}

impl NameLockExternalTransfer {
    pub fn public_key(&self) -> LockPublicKey {
        self.private_key.public_key()
    }

    /// Where the third party should send the name.
    pub fn lock_script_address(&self) -> Address {
        lock_script_address(&self.public_key())
    }

    pub async fn confirmation_details(
        &self,
        ctx: &Context,
    ) -> Result<ExternalConfirmation, ServiceError> {
        let ledger = ctx.ledger();
        let coins = ledger
            .get_coins_by_address(&self.lock_script_address())
            .await?;

        let found = coins.into_iter().find(|c| {
            c.height.is_some()
                && c.covenant.kind == CovenantKind::Finalize
                && c.covenant.finalized_name() == Some(self.name.as_str())
        });
        let Some(coin) = found else {
            return Ok(ExternalConfirmation::Waiting);
        };

        let mtime = ledger
            .get_transaction(&coin.hash)
            .await?
            .map(|r| r.mtime)
            .unwrap_or_default();
        Ok(ExternalConfirmation::Confirmed {
            confirmed_at: mtime * 1_000,
            finalize_tx_hash: coin.hash,
            finalize_output_idx: coin.index,
        })
    }

    /// Turn a confirmed external lock into the finalize record auctions are
    /// built from.
    pub fn to_finalize(&self, status: &ExternalConfirmation) -> Option<NameLockFinalize> {
        match *status {
            ExternalConfirmation::Waiting => None,
            ExternalConfirmation::Confirmed {
                confirmed_at,
                finalize_tx_hash,
                finalize_output_idx,
            } => Some(NameLockFinalize {
                name: self.name.clone(),
                finalize_tx_hash,
                finalize_output_idx,
                private_key: self.private_key.clone(),
                broadcast_at: confirmed_at,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Cancel: Transfer & Finalize
// ---------------------------------------------------------------------------

/// The lock key signed the name out of the lock script, back towards an
/// ordinary address. Every outstanding swap proof is void from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameLockCancelTransfer {
    pub name: String,
    pub transfer_tx_hash: TxHash,
    pub transfer_output_idx: u32,
    #[serde(with = "secret_hex")]
    pub private_key: LockKeypair,
    pub cancel_addr: Address,
    pub broadcast_at: u64,
}

impl NameLockCancelTransfer {
    pub fn public_key(&self) -> LockPublicKey {
        self.private_key.public_key()
    }

    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.transfer_tx_hash, self.transfer_output_idx)
    }

    pub async fn confirmation_details(&self, ctx: &Context) -> Result<LockupConfirmation, ServiceError> {
        LockupConfirmation::fetch(ctx, &self.transfer_tx_hash).await
    }
}

/// The cancellation was finalized; the name is back at `cancel_addr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameLockCancelFinalize {
    pub name: String,
    pub finalize_tx_hash: TxHash,
    pub finalize_output_idx: u32,
    pub broadcast_at: u64,
}

impl NameLockCancelFinalize {
    pub async fn confirmation_details(&self, ctx: &Context) -> Result<Confirmation, ServiceError> {
        Confirmation::fetch(ctx, &self.finalize_tx_hash).await
    }
}
