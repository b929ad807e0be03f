//! # Hashing Utilities
//!
//! The swap protocol needs exactly three digests and we refuse to grow more
//! without a very good reason:
//!
//! - **SHA-256** -- name hashes and script-hash addresses. These are what the
//!   ledger indexes by, so they must match what other tools compute.
//! - **BLAKE3** -- transaction hashes and signature hashes. Fast, and nobody
//!   outside this protocol needs to reproduce them bit for bit.
//! - **BLAKE160** -- the first 20 bytes of BLAKE3, used for key-hash addresses.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a fixed-size array.
///
/// # Example
///
/// ```
/// use namedex_protocol::crypto::sha256;
///
/// let hash = sha256(b"namedex");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// 160-bit truncation of BLAKE3. Key-hash addresses commit to this.
pub fn blake160(data: &[u8]) -> [u8; 20] {
    let full = blake3_hash(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn blake160_is_prefix_of_blake3() {
        let data = b"lock script";
        assert_eq!(&blake3_hash(data)[..20], &blake160(data)[..]);
    }

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(blake3_hash(b"x"), blake3_hash(b"x"));
        assert_ne!(blake3_hash(b"x"), blake3_hash(b"y"));
    }
}
