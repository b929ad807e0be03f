//! Name validity rules and name hashing.
//!
//! These mirror the ledger's consensus rules closely enough that anything we
//! accept, the ledger would accept too. Covenants reference names by hash, so
//! `hash_name` must agree with the ledger byte for byte.

use crate::crypto::sha256;
use crate::error::ValidationError;

/// Longest name the ledger will register.
pub const MAX_NAME_SIZE: usize = 63;

/// Returns `true` if `name` satisfies the ledger's name rules:
/// 1 to 63 characters of `[a-z0-9-_]`, not starting or ending with `-` or `_`.
pub fn verify_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_SIZE {
        return false;
    }

    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b != b'-' && b != b'_';
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }

    bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// Like [`verify_name`], but as a `Result` for constructors.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if verify_name(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

/// The 32-byte name hash covenants commit to.
pub fn hash_name(name: &str) -> [u8; 32] {
    sha256(name.as_bytes())
}
