//! # Lock Key Management
//!
//! Every listing gets a brand new Ed25519 keypair. The lock script pins the
//! public half; the secret half is the only thing that can sign swap proofs
//! for that name. Keys are never reused across names: if one leaks, exactly
//! one listing is exposed.
//!
//! ## Security considerations
//!
//! - Secret keys are generated from `OsRng`.
//! - `LockKeypair` does NOT implement `Serialize`. Persisting a secret must be
//!   a deliberate act, spelled out with `#[serde(with = "secret_hex")]` on the
//!   record that owns it.
//! - `Debug` output never includes secret bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::ValidationError;

/// Length of a raw Ed25519 signature, before the sighash type byte.
pub const SIGNATURE_LENGTH: usize = 64;

/// A per-listing signing keypair.
///
/// # Examples
///
/// ```
/// use namedex_protocol::crypto::keys::LockKeypair;
///
/// let kp = LockKeypair::generate();
/// let sig = kp.sign(b"sighash");
/// assert!(kp.public_key().verify(b"sighash", &sig));
/// ```
#[derive(Clone)]
pub struct LockKeypair {
    signing_key: SigningKey,
}

/// The public half of a lock keypair. This is what goes into lock scripts and
/// auction files.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockPublicKey {
    bytes: [u8; 32],
}

impl LockKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from its 32-byte secret.
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(hex_str).map_err(|_| ValidationError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ValidationError::InvalidSecretKey)?;
        Ok(Self::from_bytes(&arr))
    }

    /// Returns the public key for this keypair.
    pub fn public_key(&self) -> LockPublicKey {
        LockPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Ed25519 is deterministic: same key and message, same
    /// signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Hex-encoded secret key. Handle with care.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl PartialEq for LockKeypair {
    fn eq(&self, other: &Self) -> bool {
        self.signing_key.to_bytes() == other.signing_key.to_bytes()
    }
}

impl Eq for LockKeypair {}

impl fmt::Debug for LockKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockKeypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl LockPublicKey {
    /// Parse and validate raw public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ValidationError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&arr).map_err(|_| ValidationError::InvalidPublicKey)?;
        Ok(Self { bytes: arr })
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(hex_str: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(hex_str).map_err(|e| ValidationError::InvalidHex {
            field: "publicKey",
            reason: e.to_string(),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Raw key bytes, as pushed into the lock script.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex-encoded key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verify a raw 64-byte signature. Any malformed input is simply `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
    }
}

impl fmt::Debug for LockPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockPublicKey({})", self.to_hex())
    }
}

impl fmt::Display for LockPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for LockPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LockPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter persisting a [`LockKeypair`] as its hex secret.
pub mod secret_hex {
    use super::LockKeypair;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(kp: &LockKeypair, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&kp.secret_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LockKeypair, D::Error> {
        let s = String::deserialize(deserializer)?;
        LockKeypair::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
