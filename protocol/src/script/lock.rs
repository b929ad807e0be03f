//! # The Name Lock Script
//!
//! The covenant-gated script that holds a name while it is listed:
//!
//! ```text
//! OP_TYPE OP_9 OP_EQUAL
//! OP_IF
//!     <public key> OP_CHECKSIG
//! OP_ELSE
//!     OP_TYPE OP_10 OP_EQUAL
//! OP_ENDIF
//! ```
//!
//! Read it as two doors:
//!
//! 1. If the spending transaction puts a `TRANSFER` covenant at this input's
//!    index, the lock key must sign. That is how a sale (or a cancellation)
//!    moves the name.
//! 2. If it puts a `FINALIZE` there instead, nobody needs to sign. Anyone can
//!    finalize a transfer that was already authorized, which is what lets a
//!    buyer complete the swap without the seller being online.
//!
//! The script hash of this script is the lock address, so every listing has
//! its own address.

use super::opcode::{Opcode, Script};
use crate::chain::{Address, CovenantKind};
use crate::crypto::LockPublicKey;

/// Build the lock script for `key`.
pub fn create_lock_script(key: &LockPublicKey) -> Script {
    Script::new(vec![
        Opcode::Type,
        Opcode::Int(CovenantKind::Transfer.as_u8()),
        Opcode::Equal,
        Opcode::If,
        Opcode::Push(key.as_bytes().to_vec()),
        Opcode::CheckSig,
        Opcode::Else,
        Opcode::Type,
        Opcode::Int(CovenantKind::Finalize.as_u8()),
        Opcode::Equal,
        Opcode::EndIf,
    ])
}

/// The script-hash address that [`create_lock_script`] locks to.
pub fn lock_script_address(key: &LockPublicKey) -> Address {
    Address::from_script(&create_lock_script(key))
}
