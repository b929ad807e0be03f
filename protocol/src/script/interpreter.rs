//! # Script Interpreter
//!
//! A small stack machine, enough to evaluate lock scripts and key-hash
//! spends exactly the way the ledger would. We use it for three things:
//!
//! 1. Sellers self-check a freshly signed swap proof before publishing it.
//! 2. Buyers verify proofs before spending money on them.
//! 3. Fill runs a sanity check on the locked input before signing its own.
//!
//! Stack items are byte strings. Truthiness follows the usual rule: empty or
//! all-zero is false, anything else is true.

use thiserror::Error;

use super::opcode::{Opcode, Script};
use crate::chain::{signature_hash, Coin, SighashType, Transaction};
use crate::crypto::keys::SIGNATURE_LENGTH;
use crate::crypto::{blake160, sha256, LockPublicKey};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script ended in the middle of a push")]
    Truncated,

    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("stack underflow at {0}")]
    StackUnderflow(&'static str),

    #[error("unbalanced conditional")]
    UnbalancedConditional,

    #[error("OP_EQUALVERIFY failed")]
    EqualVerifyFailed,

    #[error("script evaluated to false")]
    EvalFalse,

    #[error("input {index} has no output at the same index to inspect")]
    MissingOutput { index: usize },

    #[error("input {index} does not exist")]
    MissingInput { index: usize },

    #[error("witness is empty")]
    EmptyWitness,

    #[error("witness script does not hash to the coin's address")]
    ScriptHashMismatch,

    #[error("key-hash witness must have exactly 2 items, found {0}")]
    KeyHashWitnessSize(usize),

    #[error("unsupported address version {0}")]
    UnsupportedAddress(u8),

    #[error("signature has an unknown sighash type 0x{0:02x}")]
    BadSighashType(u8),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The transaction input a script is being evaluated for.
#[derive(Debug, Clone, Copy)]
pub struct SpendContext<'a> {
    pub tx: &'a Transaction,
    pub index: usize,
    pub value: u64,
}

fn truthy(item: &[u8]) -> bool {
    item.iter().any(|&b| b != 0)
}

fn bool_item(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

fn small_int(n: u8) -> Vec<u8> {
    if n == 0 {
        Vec::new()
    } else {
        vec![n]
    }
}

fn pop(stack: &mut Vec<Vec<u8>>, at: &'static str) -> Result<Vec<u8>, ScriptError> {
    stack.pop().ok_or(ScriptError::StackUnderflow(at))
}

/// Run `script` against `stack` for the given spend.
///
/// Succeeds only if the script completes, all conditionals are closed, and
/// the top of the stack is true.
pub fn execute(
    script: &Script,
    stack: &mut Vec<Vec<u8>>,
    ctx: SpendContext<'_>,
) -> Result<(), ScriptError> {
    let encoded = script.encode();
    let mut branches: Vec<bool> = Vec::new();

    for op in script.ops() {
        let executing = branches.iter().all(|&b| b);
        if !executing && !op.is_conditional() {
            continue;
        }

        match op {
            Opcode::Int(n) => stack.push(small_int(*n)),
            Opcode::Push(data) => stack.push(data.clone()),
            Opcode::Type => {
                let output = ctx
                    .tx
                    .outputs
                    .get(ctx.index)
                    .ok_or(ScriptError::MissingOutput { index: ctx.index })?;
                stack.push(small_int(output.covenant.kind.as_u8()));
            }
            Opcode::Equal => {
                let a = pop(stack, "OP_EQUAL")?;
                let b = pop(stack, "OP_EQUAL")?;
                stack.push(bool_item(a == b));
            }
            Opcode::EqualVerify => {
                let a = pop(stack, "OP_EQUALVERIFY")?;
                let b = pop(stack, "OP_EQUALVERIFY")?;
                if a != b {
                    return Err(ScriptError::EqualVerifyFailed);
                }
            }
            Opcode::If => {
                let cond = if executing {
                    truthy(&pop(stack, "OP_IF")?)
                } else {
                    false
                };
                branches.push(cond);
            }
            Opcode::Else => {
                let last = branches
                    .last_mut()
                    .ok_or(ScriptError::UnbalancedConditional)?;
                *last = !*last;
            }
            Opcode::EndIf => {
                branches.pop().ok_or(ScriptError::UnbalancedConditional)?;
            }
            Opcode::Dup => {
                let top = stack
                    .last()
                    .cloned()
                    .ok_or(ScriptError::StackUnderflow("OP_DUP"))?;
                stack.push(top);
            }
            Opcode::Blake160 => {
                let item = pop(stack, "OP_BLAKE160")?;
                stack.push(blake160(&item).to_vec());
            }
            Opcode::CheckSig => {
                let key = pop(stack, "OP_CHECKSIG")?;
                let sig = pop(stack, "OP_CHECKSIG")?;
                let ok = check_signature(&sig, &key, &encoded, ctx)?;
                stack.push(bool_item(ok));
            }
        }
    }

    if !branches.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }

    match stack.last() {
        Some(top) if truthy(top) => Ok(()),
        _ => Err(ScriptError::EvalFalse),
    }
}

/// Verify a `signature || sighash type` blob. Malformed keys or signatures
/// are simply false; an unknown sighash type is an error.
fn check_signature(
    sig: &[u8],
    key: &[u8],
    script: &[u8],
    ctx: SpendContext<'_>,
) -> Result<bool, ScriptError> {
    if sig.len() != SIGNATURE_LENGTH + 1 {
        return Ok(false);
    }
    let Ok(key) = LockPublicKey::from_bytes(key) else {
        return Ok(false);
    };

    let type_byte = sig[SIGNATURE_LENGTH];
    let ty = SighashType::from_byte(type_byte).ok_or(ScriptError::BadSighashType(type_byte))?;
    let digest = signature_hash(ctx.tx, ctx.index, script, ctx.value, ty)
        .ok_or(ScriptError::MissingInput { index: ctx.index })?;

    Ok(key.verify(&digest, &sig[..SIGNATURE_LENGTH]))
}

/// Verify that input `index` of `tx` validly spends `coin`.
///
/// Script-hash coins expect `[args..., script]` in the witness; key-hash
/// coins expect `[signature, public key]`.
pub fn verify_input(tx: &Transaction, index: usize, coin: &Coin) -> Result<(), ScriptError> {
    let input = tx
        .inputs
        .get(index)
        .ok_or(ScriptError::MissingInput { index })?;
    let ctx = SpendContext {
        tx,
        index,
        value: coin.value,
    };

    if coin.address.is_script_hash() {
        let (script_bytes, args) = input
            .witness
            .split_last()
            .ok_or(ScriptError::EmptyWitness)?;
        if sha256(script_bytes)[..] != *coin.address.hash() {
            return Err(ScriptError::ScriptHashMismatch);
        }
        let script = Script::decode(script_bytes)?;
        let mut stack = args.to_vec();
        execute(&script, &mut stack, ctx)
    } else if coin.address.is_key_hash() {
        if input.witness.len() != 2 {
            return Err(ScriptError::KeyHashWitnessSize(input.witness.len()));
        }
        let script = Script::pay_to_key_hash(coin.address.hash());
        let mut stack = input.witness.clone();
        execute(&script, &mut stack, ctx)
    } else {
        Err(ScriptError::UnsupportedAddress(coin.address.version()))
    }
}
