//! # Seller & Buyer Operations
//!
//! The end-to-end steps of a swap, each one a single request/response
//! against the ledger and wallet in a [`Context`]. Every step returns the
//! lifecycle record it produced; persisting it is the caller's job (see
//! [`DataStore`](crate::storage::DataStore)).
//!
//! Seller:
//!
//! ```text
//! transfer_name_lock ─> finalize_name_lock ─> propose_swap / AuctionFactory
//!        (or create_name_lock_external)            │
//!                                                  └─> transfer_name_lock_cancel
//!                                                        └─> finalize_name_lock_cancel
//! ```
//!
//! Buyer: `fill_swap ─> finalize_swap`.
//!
//! Marketplace: `get_post_fee_info` before building an auction,
//! `post_auction` after.
//!
//! Nothing here waits or retries. If a step needs a confirmation that has
//! not happened yet, it fails with [`SwapError::Unconfirmed`] and the caller
//! tries again later.

use serde_json::Value;
use tracing::info;

use crate::chain::{
    hash_name, validate_name, Address, Covenant, CovenantKind, MutableTx, Outpoint, Output,
    SighashType, Transaction,
};
use crate::auction::Auction;
use crate::config::{FEE_RATE_BASIS, SEQUENCE_FINAL};
use crate::context::Context;
use crate::crypto::LockKeypair;
use crate::error::ValidationError;
use crate::lock::{
    now_millis, NameLockCancelFinalize, NameLockCancelTransfer, NameLockExternalTransfer,
    NameLockFinalize, NameLockTransfer,
};
use crate::marketplace::MarketplaceService;
use crate::script::{create_lock_script, lock_script_address, verify_input};
use crate::swap::{
    create_finalize, fund_preserving_name_slot, sign_input, SwapError, SwapFill, SwapFinalize,
    SwapProof, SwapProofBuilder, Verification,
};

/// Index of the first output carrying `kind` for `name`.
fn name_output(tx: &Transaction, kind: CovenantKind, name: &str) -> Option<u32> {
    let hash = hash_name(name);
    tx.outputs
        .iter()
        .position(|o| o.covenant.kind == kind && o.covenant.name_hash() == Some(hash))
        .and_then(|i| u32::try_from(i).ok())
}

// ---------------------------------------------------------------------------
// Seller: Locking
// ---------------------------------------------------------------------------

/// Prepare a lock for a name that someone else will transfer and finalize
/// into the lock script. Nothing touches the ledger yet; hand the record's
/// [`lock_script_address`](NameLockExternalTransfer::lock_script_address)
/// to whoever holds the name.
pub fn create_name_lock_external(name: &str) -> Result<NameLockExternalTransfer, SwapError> {
    validate_name(name)?;
    Ok(NameLockExternalTransfer {
        name: name.to_string(),
        private_key: LockKeypair::generate(),
        created_at: now_millis(),
    })
}

/// Transfer a wallet-owned name to a fresh lock script.
pub async fn transfer_name_lock(ctx: &Context, name: &str) -> Result<NameLockTransfer, SwapError> {
    validate_name(name)?;
    let private_key = LockKeypair::generate();
    let lock_addr = lock_script_address(&private_key.public_key());

    let tx = ctx.wallet().send_transfer(name, &lock_addr).await?;
    let hash = tx.hash();
    let transfer_output_idx =
        name_output(&tx, CovenantKind::Transfer, name).ok_or(SwapError::NoTransferOutput(hash))?;

    info!(%name, tx = %hash, lock_address = ?lock_addr, "transferred name to lock script");
    Ok(NameLockTransfer {
        name: name.to_string(),
        transfer_tx_hash: hash,
        transfer_output_idx,
        private_key,
        broadcast_at: now_millis(),
    })
}

/// Finalize our transfer into the lock script once the lockup has passed.
pub async fn finalize_name_lock(
    ctx: &Context,
    transfer: &NameLockTransfer,
) -> Result<NameLockFinalize, SwapError> {
    let name = transfer.name.as_str();
    let tx = ctx.wallet().send_finalize(name).await?;
    let hash = tx.hash();
    let finalize_output_idx =
        name_output(&tx, CovenantKind::Finalize, name).ok_or(SwapError::NoFinalizeOutput(hash))?;

    info!(%name, tx = %hash, "finalized name into lock script");
    Ok(NameLockFinalize {
        name: transfer.name.clone(),
        finalize_tx_hash: hash,
        finalize_output_idx,
        private_key: transfer.private_key.clone(),
        broadcast_at: now_millis(),
    })
}

// ---------------------------------------------------------------------------
// Seller: Cancelling
// ---------------------------------------------------------------------------

/// Pull a locked name back out of the lock script, towards `cancel_addr`.
///
/// The lock key signs the name input with `SINGLE | ANYONECANPAY`, which
/// the lock script accepts for a `TRANSFER`. Once this confirms, the locked
/// coin is gone and every outstanding swap proof is void.
pub async fn transfer_name_lock_cancel(
    ctx: &Context,
    lock: &NameLockFinalize,
    cancel_addr: Address,
) -> Result<NameLockCancelTransfer, SwapError> {
    let name = lock.name.as_str();
    let outpoint = lock.outpoint();
    let ledger = ctx.ledger();

    let coin = ledger
        .get_coin(&outpoint)
        .await?
        .ok_or(SwapError::CoinNotFound { outpoint })?;
    if coin.covenant.kind != CovenantKind::Finalize {
        return Err(SwapError::UnexpectedCovenant {
            outpoint,
            expected: CovenantKind::Finalize,
            found: coin.covenant.kind,
        });
    }
    let info = ledger
        .get_name_info(name)
        .await?
        .ok_or_else(|| SwapError::NameNotFound(name.to_string()))?;

    let lock_script = create_lock_script(&lock.public_key());
    let mut mtx = MutableTx::new();
    mtx.add_coin(coin.clone(), SEQUENCE_FINAL);
    mtx.add_output(Output {
        value: coin.value,
        address: coin.address.clone(),
        covenant: Covenant::transfer(&hash_name(name), info.height, &cancel_addr),
    });

    let mut funded = fund_preserving_name_slot(ctx, mtx).await?;
    let signature = sign_input(
        &funded,
        0,
        &lock_script,
        &lock.private_key,
        SighashType::SINGLE_ANYONECANPAY,
    )?;
    funded.tx.inputs[0].witness = vec![signature, lock_script.encode()];
    verify_input(&funded.tx, 0, &coin).map_err(SwapError::SanityCheck)?;

    let signed = ctx.wallet().sign_inputs_from(1, funded).await?;
    let hash = ledger.broadcast(&signed.tx).await?;

    info!(%name, tx = %hash, cancel_address = ?cancel_addr, "broadcast cancel transfer");
    Ok(NameLockCancelTransfer {
        name: lock.name.clone(),
        transfer_tx_hash: hash,
        transfer_output_idx: 0,
        private_key: lock.private_key.clone(),
        cancel_addr,
        broadcast_at: now_millis(),
    })
}

/// Finalize a confirmed cancel transfer, delivering the name to the cancel
/// address.
pub async fn finalize_name_lock_cancel(
    ctx: &Context,
    cancel: &NameLockCancelTransfer,
) -> Result<NameLockCancelFinalize, SwapError> {
    let outpoint = cancel.outpoint();
    let coin = ctx
        .ledger()
        .get_coin(&outpoint)
        .await?
        .ok_or(SwapError::CoinNotFound { outpoint })?;
    if coin.height.is_none() {
        return Err(SwapError::Unconfirmed(cancel.transfer_tx_hash));
    }

    let tx = create_finalize(ctx, &cancel.name, &coin, &cancel.public_key()).await?;
    let hash = ctx.ledger().broadcast(&tx).await?;

    info!(name = %cancel.name, tx = %hash, "broadcast cancel finalize");
    Ok(NameLockCancelFinalize {
        name: cancel.name.clone(),
        finalize_tx_hash: hash,
        finalize_output_idx: 0,
        broadcast_at: now_millis(),
    })
}

// ---------------------------------------------------------------------------
// Seller: Proposing
// ---------------------------------------------------------------------------

/// Marketplace fee terms for a single proof.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeTerms {
    pub fee: u64,
    pub fee_addr: Option<Address>,
}

/// Sign a single swap proof for a locked name. Payment goes to
/// `payment_addr`, or a fresh wallet address.
pub async fn propose_swap(
    ctx: &Context,
    lock: &NameLockFinalize,
    price: u64,
    lock_time: u32,
    payment_addr: Option<Address>,
    fee: FeeTerms,
) -> Result<SwapProof, SwapError> {
    let payment_addr = match payment_addr {
        Some(addr) => addr,
        None => ctx.wallet().create_address().await?,
    };

    let mut proof = SwapProofBuilder::new(
        lock.name.clone(),
        lock.outpoint(),
        lock.public_key(),
        payment_addr,
    )
    .price(price)
    .lock_time(lock_time)
    .fee(fee.fee, fee.fee_addr)
    .build()?;
    proof.sign(ctx, &lock.private_key).await?;

    info!(name = %lock.name, price, lock_time, "proposed swap");
    Ok(proof)
}

// ---------------------------------------------------------------------------
// Seller: Marketplace
// ---------------------------------------------------------------------------

/// A marketplace's listing fee, checked and decoded for the context's
/// network. Feed it into [`AuctionParams`](crate::auction::AuctionParams).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFeeInfo {
    pub rate: u64,
    pub addr: Option<Address>,
}

/// Ask the marketplace what it charges for listing. A marketplace without
/// a fee endpoint charges nothing.
pub async fn get_post_fee_info(
    ctx: &Context,
    market: &dyn MarketplaceService,
) -> Result<PostFeeInfo, SwapError> {
    let Some(info) = market.fee_info().await? else {
        return Ok(PostFeeInfo::default());
    };
    if info.rate > FEE_RATE_BASIS {
        return Err(ValidationError::InvalidFeeRate(info.rate).into());
    }
    let addr = info
        .addr
        .as_deref()
        .map(|a| Address::decode(a, ctx.network()))
        .transpose()?;
    if info.rate > 0 && addr.is_none() {
        return Err(ValidationError::MissingFeeAddress.into());
    }
    Ok(PostFeeInfo {
        rate: info.rate,
        addr,
    })
}

/// Upload a signed auction. Returns the marketplace's answer untouched.
pub async fn post_auction(
    ctx: &Context,
    market: &dyn MarketplaceService,
    auction: &Auction,
) -> Result<Value, SwapError> {
    let body = serde_json::json!({ "auction": auction.to_json_value(ctx.network())? });
    let answer = market.upload_auction(&body).await?;
    info!(name = %auction.name(), proofs = auction.data().len(), "posted auction");
    Ok(answer)
}

// ---------------------------------------------------------------------------
// Buyer
// ---------------------------------------------------------------------------

/// Verify, fill and broadcast someone's swap proof. The name goes to a
/// fresh wallet address.
pub async fn fill_swap(ctx: &Context, proof: &SwapProof) -> Result<SwapFill, SwapError> {
    if let Verification::Invalid(reason) = proof.verify(ctx).await? {
        return Err(SwapError::InvalidProof(reason));
    }

    let recipient = ctx.wallet().create_address().await?;
    let tx = proof.fill(ctx, &recipient).await?;
    let hash = ctx.ledger().broadcast(&tx).await?;

    info!(name = %proof.name(), tx = %hash, price = proof.price(), fee = proof.fee(), "broadcast swap fill");
    Ok(SwapFill {
        name: proof.name().to_string(),
        fulfillment_tx_hash: hash,
        locking_public_key: *proof.public_key(),
        price: proof.price(),
        fee: proof.fee(),
        broadcast_at: now_millis(),
    })
}

/// Finalize a confirmed fill, taking delivery of the name.
pub async fn finalize_swap(ctx: &Context, fill: &SwapFill) -> Result<SwapFinalize, SwapError> {
    let hash = fill.fulfillment_tx_hash;
    let ledger = ctx.ledger();
    let record = ledger
        .get_transaction(&hash)
        .await?
        .ok_or(SwapError::TransactionNotFound(hash))?;
    if record.height.is_none() {
        return Err(SwapError::Unconfirmed(hash));
    }

    let index = name_output(&record.tx, CovenantKind::Transfer, &fill.name)
        .ok_or(SwapError::NoTransferOutput(hash))?;
    let outpoint = Outpoint::new(hash, index);
    let coin = ledger
        .get_coin(&outpoint)
        .await?
        .ok_or(SwapError::CoinNotFound { outpoint })?;

    let tx = create_finalize(ctx, &fill.name, &coin, &fill.locking_public_key).await?;
    let finalize_hash = ledger.broadcast(&tx).await?;

    info!(name = %fill.name, tx = %finalize_hash, "broadcast swap finalize");
    Ok(SwapFinalize {
        name: fill.name.clone(),
        finalize_tx_hash: finalize_hash,
        broadcast_at: now_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxHash;

    #[test]
    fn external_lock_validates_name() {
        assert!(matches!(
            create_name_lock_external("Not A Name"),
            Err(SwapError::Validation(_))
        ));
        let lock = create_name_lock_external("example").unwrap();
        assert_eq!(lock.name, "example");
        assert!(lock.lock_script_address().is_script_hash());
        assert!(lock.created_at > 0);
    }

    #[test]
    fn finds_name_outputs_by_kind() {
        let addr = Address::new(0, vec![1; 20]).unwrap();
        let mut tx = Transaction::default();
        tx.outputs.push(Output::new(5, addr.clone()));
        tx.outputs.push(Output {
            value: 0,
            address: addr.clone(),
            covenant: Covenant::transfer(&hash_name("other"), 1, &addr),
        });
        tx.outputs.push(Output {
            value: 0,
            address: addr.clone(),
            covenant: Covenant::transfer(&hash_name("example"), 1, &addr),
        });

        assert_eq!(name_output(&tx, CovenantKind::Transfer, "example"), Some(2));
        assert_eq!(name_output(&tx, CovenantKind::Finalize, "example"), None);
        assert_ne!(tx.hash(), TxHash::ZERO);
    }
}
