//! Ledger addresses.
//!
//! An address is a witness version plus a program hash. Version 0 comes in
//! two flavors, told apart by length:
//!
//! | Program | Meaning                                   |
//! |---------|-------------------------------------------|
//! | 20 B    | key hash: `blake160(public key)`          |
//! | 32 B    | script hash: `sha256(encoded script)`     |
//!
//! The string form is segwit-style bech32 with a per-network prefix. Inside
//! stored records we keep the raw `{version, hash}` form so records do not
//! depend on which network wrote them.

use bech32::{segwit, Fe32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Network;
use crate::crypto::{blake160, sha256, LockPublicKey};
use crate::error::ValidationError;
use crate::script::Script;

/// Key-hash program length.
pub const KEY_HASH_LENGTH: usize = 20;

/// Script-hash program length.
pub const SCRIPT_HASH_LENGTH: usize = 32;

/// A version + hash pair identifying who may spend an output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAddress")]
pub struct Address {
    version: u8,
    #[serde(with = "hex_bytes")]
    hash: Vec<u8>,
}

/// Stored form of an [`Address`], checked by [`Address::new`] on load.
#[derive(Deserialize)]
struct RawAddress {
    version: u8,
    #[serde(with = "hex_bytes")]
    hash: Vec<u8>,
}

impl TryFrom<RawAddress> for Address {
    type Error = ValidationError;

    fn try_from(raw: RawAddress) -> Result<Self, Self::Error> {
        Address::new(raw.version, raw.hash)
    }
}

impl Address {
    /// Build an address from raw parts, enforcing the program-length rules.
    pub fn new(version: u8, hash: Vec<u8>) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidAddress {
            address: format!("{}:{}", version, hex::encode(&hash)),
            reason: reason.to_string(),
        };
        if version > 31 {
            return Err(invalid("witness version above 31"));
        }
        if version == 0 && hash.len() != KEY_HASH_LENGTH && hash.len() != SCRIPT_HASH_LENGTH {
            return Err(invalid("version 0 programs must be 20 or 32 bytes"));
        }
        if !(2..=40).contains(&hash.len()) {
            return Err(invalid("program must be 2 to 40 bytes"));
        }
        Ok(Self { version, hash })
    }

    /// Key-hash address for a public key.
    pub fn from_public_key(key: &LockPublicKey) -> Self {
        Self {
            version: 0,
            hash: blake160(key.as_bytes()).to_vec(),
        }
    }

    /// Script-hash address for a redeem script.
    pub fn from_script(script: &Script) -> Self {
        Self {
            version: 0,
            hash: sha256(&script.encode()).to_vec(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Returns `true` for version-0 key-hash addresses.
    pub fn is_key_hash(&self) -> bool {
        self.version == 0 && self.hash.len() == KEY_HASH_LENGTH
    }

    /// Returns `true` for version-0 script-hash addresses.
    pub fn is_script_hash(&self) -> bool {
        self.version == 0 && self.hash.len() == SCRIPT_HASH_LENGTH
    }

    /// Bech32 string for the given network.
    pub fn encode(&self, network: Network) -> Result<String, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidAddress {
            address: hex::encode(&self.hash),
            reason,
        };
        let hrp = Hrp::parse(network.hrp()).map_err(|e| invalid(e.to_string()))?;
        let version = Fe32::try_from(self.version).map_err(|e| invalid(e.to_string()))?;
        segwit::encode(hrp, version, &self.hash).map_err(|e| invalid(e.to_string()))
    }

    /// Parse a bech32 address, rejecting addresses for other networks.
    pub fn decode(s: &str, network: Network) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidAddress {
            address: s.to_string(),
            reason,
        };
        let (hrp, version, program) = segwit::decode(s).map_err(|e| invalid(e.to_string()))?;
        if hrp.to_lowercase() != network.hrp() {
            return Err(invalid(format!(
                "prefix {} does not belong to {}",
                hrp.to_lowercase(),
                network
            )));
        }
        Self::new(version.to_u8(), program)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(v{}:{})", self.version, hex::encode(&self.hash))
    }
}

/// Hex (de)serialization for raw byte vectors.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
