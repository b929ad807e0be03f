//! `FINALIZE` transactions out of a lock script.
//!
//! Once a `TRANSFER` out of the lock script has sat through the transfer
//! lockup, anyone can finalize it: the lock script's second branch accepts a
//! `FINALIZE` output without a signature. Buyers use this to take delivery
//! of a filled swap; sellers use it to complete a cancellation.

use tracing::debug;

use super::error::SwapError;
use super::fund_preserving_name_slot;
use crate::chain::{hash_name, Coin, Covenant, CovenantKind, MutableTx, Output, Transaction};
use crate::config::SEQUENCE_FINAL;
use crate::context::Context;
use crate::crypto::LockPublicKey;
use crate::script::{create_lock_script, verify_input};

/// Finalize flag for weak (non-DNSSEC) claims.
const FLAG_WEAK: u8 = 1;

/// Build and sign (but do not broadcast) a transaction finalizing the
/// lock-script `TRANSFER` held in `transfer_coin`.
///
/// The new owner is whatever address the `TRANSFER` covenant names; the
/// caller cannot redirect it.
pub async fn create_finalize(
    ctx: &Context,
    name: &str,
    transfer_coin: &Coin,
    locking_key: &LockPublicKey,
) -> Result<Transaction, SwapError> {
    if transfer_coin.covenant.kind != CovenantKind::Transfer {
        return Err(SwapError::UnexpectedCovenant {
            outpoint: transfer_coin.outpoint(),
            expected: CovenantKind::Transfer,
            found: transfer_coin.covenant.kind,
        });
    }
    let owner = transfer_coin
        .covenant
        .transfer_address()
        .ok_or(SwapError::MalformedCovenant {
            outpoint: transfer_coin.outpoint(),
            kind: CovenantKind::Transfer,
        })?;

    let ledger = ctx.ledger();
    let info = ledger
        .get_name_info(name)
        .await?
        .ok_or_else(|| SwapError::NameNotFound(name.to_string()))?;

    // Finalize commits to a block hash two renewal periods back.
    let tip = ledger.get_chain_height().await?;
    let renewal_height = tip.saturating_sub(2 * ctx.network().renewal_maturity());
    let renewal_hash = ledger
        .get_block_hash(renewal_height)
        .await?
        .ok_or(SwapError::BlockNotFound(renewal_height))?;

    let mut covenant = Covenant::new(CovenantKind::Finalize);
    covenant.push_bytes(&hash_name(name));
    covenant.push_u32(info.height);
    covenant.push_bytes(name.as_bytes());
    covenant.push_u8(if info.weak { FLAG_WEAK } else { 0 });
    covenant.push_u32(info.claimed);
    covenant.push_u32(info.renewals);
    covenant.push_bytes(&renewal_hash);

    let lock_script = create_lock_script(locking_key);
    let mut mtx = MutableTx::new();
    mtx.add_coin(transfer_coin.clone(), SEQUENCE_FINAL).witness = vec![lock_script.encode()];
    mtx.add_output(Output {
        value: transfer_coin.value,
        address: owner,
        covenant,
    });

    let funded = fund_preserving_name_slot(ctx, mtx).await?;
    let signed = ctx.wallet().sign_inputs_from(1, funded).await?;
    verify_input(&signed.tx, 0, transfer_coin).map_err(SwapError::SanityCheck)?;

    debug!(%name, renewal_height, "built finalize transaction");
    Ok(signed.into_tx())
}
