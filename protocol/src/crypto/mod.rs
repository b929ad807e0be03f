//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations. Nothing in here
//! is clever, and that is the point.
//!
//! - **Ed25519** (`ed25519-dalek`) for lock keys and swap-proof signatures.
//! - **SHA-256** / **BLAKE3** for name hashes, addresses and signature hashes.

pub mod hash;
pub mod keys;

pub use hash::{blake160, blake3_hash, sha256};
pub use keys::{LockKeypair, LockPublicKey};
