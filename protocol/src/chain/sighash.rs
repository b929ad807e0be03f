//! # Signature Hashes
//!
//! What a signature actually commits to. The swap protocol lives or dies on
//! one mode in particular, `SINGLEREVERSE | ANYONECANPAY`:
//!
//! - `ANYONECANPAY`: only the signed input is committed to. Anyone may add
//!   funding inputs later.
//! - `SINGLEREVERSE`: the single output at `len - 1 - index` is committed to.
//!   With the locked input at index 0, that is the LAST output, which is where
//!   the seller's payment goes. Buyers append whatever they like in front.
//!
//! Everything else is the usual `ALL` / `NONE` / `SINGLE` menu.
//!
//! ## Digest layout
//!
//! BLAKE3 over, in order: tx version, prevouts digest, sequences digest,
//! the spent outpoint, the executing script, the spent value, the input's
//! sequence, outputs digest, lock time, sighash type. Committed-away parts
//! hash as 32 zero bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::{encode_output, Transaction};
use crate::crypto::blake3_hash;

/// The base signing mode (low bits of the type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SighashBase {
    All = 1,
    None = 2,
    Single = 3,
    SingleReverse = 4,
}

/// A full sighash type: base mode plus the `ANYONECANPAY` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SighashType {
    pub base: SighashBase,
    pub anyone_can_pay: bool,
}

const ANYONECANPAY_FLAG: u8 = 0x80;

impl SighashType {
    /// Commit to everything. Used for the buyer's funding inputs.
    pub const ALL: SighashType = SighashType {
        base: SighashBase::All,
        anyone_can_pay: false,
    };

    /// The swap-proof mode: this input plus the mirrored output only.
    pub const SWAP_PROOF: SighashType = SighashType {
        base: SighashBase::SingleReverse,
        anyone_can_pay: true,
    };

    /// This input plus the same-index output only.
    pub const SINGLE_ANYONECANPAY: SighashType = SighashType {
        base: SighashBase::Single,
        anyone_can_pay: true,
    };

    pub fn to_byte(self) -> u8 {
        let flag = if self.anyone_can_pay { ANYONECANPAY_FLAG } else { 0 };
        self.base as u8 | flag
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        let base = match byte & !ANYONECANPAY_FLAG {
            1 => SighashBase::All,
            2 => SighashBase::None,
            3 => SighashBase::Single,
            4 => SighashBase::SingleReverse,
            _ => return None,
        };
        Some(Self {
            base,
            anyone_can_pay: byte & ANYONECANPAY_FLAG != 0,
        })
    }
}

impl fmt::Display for SighashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base {
            SighashBase::All => "ALL",
            SighashBase::None => "NONE",
            SighashBase::Single => "SINGLE",
            SighashBase::SingleReverse => "SINGLEREVERSE",
        };
        if self.anyone_can_pay {
            write!(f, "{}|ANYONECANPAY", base)
        } else {
            f.write_str(base)
        }
    }
}

/// Compute the digest that input `index` signs.
///
/// `script` is the encoding of the script being executed and `value` the
/// amount of the coin being spent. Returns `None` if `index` is out of range.
pub fn signature_hash(
    tx: &Transaction,
    index: usize,
    script: &[u8],
    value: u64,
    ty: SighashType,
) -> Option<[u8; 32]> {
    let input = tx.inputs.get(index)?;

    let prevouts = if ty.anyone_can_pay {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
        for i in &tx.inputs {
            buf.extend_from_slice(i.prevout.hash.as_bytes());
            buf.extend_from_slice(&i.prevout.index.to_le_bytes());
        }
        blake3_hash(&buf)
    };

    let sequences = if ty.anyone_can_pay || ty.base != SighashBase::All {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 4);
        for i in &tx.inputs {
            buf.extend_from_slice(&i.sequence.to_le_bytes());
        }
        blake3_hash(&buf)
    };

    let committed_output = match ty.base {
        SighashBase::All | SighashBase::None => None,
        SighashBase::Single => Some(tx.outputs.get(index)),
        SighashBase::SingleReverse => Some(
            tx.outputs
                .len()
                .checked_sub(1 + index)
                .and_then(|i| tx.outputs.get(i)),
        ),
    };

    let outputs = match (ty.base, committed_output) {
        (SighashBase::All, _) => {
            let mut buf = Vec::new();
            for o in &tx.outputs {
                encode_output(o, &mut buf);
            }
            blake3_hash(&buf)
        }
        (_, Some(Some(output))) => {
            let mut buf = Vec::new();
            encode_output(output, &mut buf);
            blake3_hash(&buf)
        }
        _ => [0u8; 32],
    };

    let mut buf = Vec::with_capacity(256 + script.len());
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&prevouts);
    buf.extend_from_slice(&sequences);
    buf.extend_from_slice(input.prevout.hash.as_bytes());
    buf.extend_from_slice(&input.prevout.index.to_le_bytes());
    buf.extend_from_slice(&(script.len() as u32).to_le_bytes());
    buf.extend_from_slice(script);
    buf.extend_from_slice(&value.to_le_bytes());
    buf.extend_from_slice(&input.sequence.to_le_bytes());
    buf.extend_from_slice(&outputs);
    buf.extend_from_slice(&tx.locktime.to_le_bytes());
    buf.extend_from_slice(&u32::from(ty.to_byte()).to_le_bytes());

    Some(blake3_hash(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::address::Address;
    use crate::chain::transaction::{Input, Outpoint, Output, TxHash};

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::default();
        tx.inputs.push(Input::new(Outpoint::new(TxHash::from_bytes([1; 32]), 0)));
        tx.outputs.push(Output::new(10, Address::new(0, vec![1; 20]).unwrap()));
        tx.outputs.push(Output::new(20, Address::new(0, vec![2; 20]).unwrap()));
        tx
    }

    #[test]
    fn type_byte_roundtrip() {
        assert_eq!(SighashType::SWAP_PROOF.to_byte(), 0x84);
        assert_eq!(SighashType::from_byte(0x84), Some(SighashType::SWAP_PROOF));
        assert_eq!(SighashType::from_byte(0x01), Some(SighashType::ALL));
        assert_eq!(SighashType::from_byte(0x05), None);
        assert_eq!(SighashType::SWAP_PROOF.to_string(), "SINGLEREVERSE|ANYONECANPAY");
    }

    #[test]
    fn swap_proof_mode_tolerates_prepended_outputs_and_extra_inputs() {
        let tx = sample_tx();
        let before = signature_hash(&tx, 0, b"s", 1, SighashType::SWAP_PROOF).unwrap();

        let mut grown = tx.clone();
        grown
            .inputs
            .push(Input::new(Outpoint::new(TxHash::from_bytes([9; 32]), 3)));
        grown
            .outputs
            .insert(0, Output::new(99, Address::new(0, vec![7; 20]).unwrap()));
        let after = signature_hash(&grown, 0, b"s", 1, SighashType::SWAP_PROOF).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn swap_proof_mode_commits_to_last_output() {
        let tx = sample_tx();
        let before = signature_hash(&tx, 0, b"s", 1, SighashType::SWAP_PROOF).unwrap();
        let mut tampered = tx.clone();
        tampered.outputs[1].value = 19;
        let after = signature_hash(&tampered, 0, b"s", 1, SighashType::SWAP_PROOF).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn all_mode_commits_to_everything() {
        let tx = sample_tx();
        let before = signature_hash(&tx, 0, b"s", 1, SighashType::ALL).unwrap();
        let mut tampered = tx.clone();
        tampered.outputs[0].value = 11;
        assert_ne!(
            before,
            signature_hash(&tampered, 0, b"s", 1, SighashType::ALL).unwrap()
        );
    }

    #[test]
    fn out_of_range_input_is_none() {
        assert!(signature_hash(&sample_tx(), 5, b"s", 1, SighashType::ALL).is_none());
    }
}
