//! # Swap Protocol
//!
//! Swap proofs (the seller's pre-signed offers), the `FINALIZE` builder that
//! settles a name transfer out of a lock script, and the buyer-side records
//! of fills and their settlement.
//!
//! Every transaction here follows the same shape: one name input at index 0
//! that the lock script guards, one name output at index 0 whose covenant
//! the lock script inspects, and whatever wallet inputs and outputs funding
//! needs after that.

pub mod error;
pub mod fill;
pub mod finalize;
pub mod proof;

pub use error::SwapError;
pub use fill::{SwapFill, SwapFinalize};
pub use finalize::create_finalize;
pub use proof::{InvalidReason, SwapProof, SwapProofBuilder, Verification};

use crate::chain::{signature_hash, MutableTx, SighashType};
use crate::context::Context;
use crate::crypto::LockKeypair;
use crate::script::{Script, ScriptError};

/// Sign input `index` of `mtx` under `script`, returning the witness
/// signature item (`signature || type byte`).
pub(crate) fn sign_input(
    mtx: &MutableTx,
    index: usize,
    script: &Script,
    keypair: &LockKeypair,
    ty: SighashType,
) -> Result<Vec<u8>, SwapError> {
    let coin = mtx
        .coin(index)
        .ok_or(SwapError::SanityCheck(ScriptError::MissingInput { index }))?;
    let digest = signature_hash(&mtx.tx, index, &script.encode(), coin.value, ty)
        .ok_or(SwapError::SanityCheck(ScriptError::MissingInput { index }))?;

    let mut signature = keypair.sign(&digest).to_vec();
    signature.push(ty.to_byte());
    Ok(signature)
}

/// Have the wallet fund `mtx`, then put the name input and name output back
/// at index 0, exactly as they were (witness included).
pub(crate) async fn fund_preserving_name_slot(
    ctx: &Context,
    mtx: MutableTx,
) -> Result<MutableTx, SwapError> {
    let name_input = mtx
        .tx
        .inputs
        .first()
        .cloned()
        .ok_or(SwapError::FundingLayout("name input"))?;
    let name_output = mtx
        .tx
        .outputs
        .first()
        .cloned()
        .ok_or(SwapError::FundingLayout("name output"))?;

    let fee_rate = ctx.fee_rate().await?;
    let mut funded = ctx.wallet().fund_transaction(mtx, fee_rate).await?;
    let tx = &mut funded.tx;

    let input_pos = tx
        .inputs
        .iter()
        .position(|i| i.prevout == name_input.prevout)
        .ok_or(SwapError::FundingLayout("name input"))?;
    tx.inputs.remove(input_pos);
    tx.inputs.insert(0, name_input);

    let output_pos = tx
        .outputs
        .iter()
        .position(|o| *o == name_output)
        .ok_or(SwapError::FundingLayout("name output"))?;
    let output = tx.outputs.remove(output_pos);
    tx.outputs.insert(0, output);

    Ok(funded)
}
