//! # Auction Transport Format
//!
//! Auctions travel between sellers, marketplaces and buyers as a single
//! versioned JSON document:
//!
//! ```json
//! {
//!   "version": 2,
//!   "name": "example",
//!   "lockingTxHash": "<hex>",
//!   "lockingOutputIdx": 0,
//!   "publicKey": "<hex>",
//!   "paymentAddr": "<bech32>",
//!   "feeAddr": "<bech32>" | null,
//!   "data": [{ "price": 1000000, "lockTime": 1700000000, "fee": 0, "signature": "<hex>" }]
//! }
//! ```
//!
//! Two older layouts still turn up: a `MAGIC:x.y.z` header line followed by
//! JSON, and newline-delimited JSON with one proof per line. Both are
//! refused with an error that says what they are, rather than a confusing
//! JSON parse failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::container::{Auction, AuctionEntry};
use crate::chain::{Address, Outpoint, TxHash};
use crate::config::{Network, MINIMUM_AUCTION_VERSION};
use crate::crypto::LockPublicKey;
use crate::error::ValidationError;

/// Why an auction file was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionFormatError {
    #[error("Invalid proof: Proof file must be valid JSON. ({0})")]
    InvalidJson(String),

    #[error("Invalid proof: Proof version missing.")]
    MissingVersion,

    #[error("Invalid proof: Proof version must be a number.")]
    NonNumericVersion,

    #[error("Invalid proof: Unsupported proof version {version} (minimum {minimum}).")]
    UnsupportedVersion { version: String, minimum: u64 },

    #[error("Invalid proof: the {header:?} header format is no longer supported.")]
    LegacyMagicHeader { header: String },

    #[error("Invalid proof: newline-delimited proof files are no longer supported.")]
    LegacyNdjson,

    #[error("Invalid proof: {0}")]
    Malformed(String),
}

impl From<ValidationError> for AuctionFormatError {
    fn from(e: ValidationError) -> Self {
        AuctionFormatError::Malformed(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuctionFile {
    version: u64,
    name: String,
    locking_tx_hash: TxHash,
    locking_output_idx: u32,
    public_key: LockPublicKey,
    payment_addr: String,
    #[serde(default)]
    fee_addr: Option<String>,
    data: Vec<AuctionEntry>,
}

// ---------------------------------------------------------------------------
// Encode / Decode
// ---------------------------------------------------------------------------

impl Auction {
    /// Serialize to the transport document. Addresses are rendered for
    /// `network`.
    pub fn to_json(&self, network: Network) -> Result<String, AuctionFormatError> {
        serde_json::to_string_pretty(&self.to_file(network)?)
            .map_err(|e| AuctionFormatError::Malformed(e.to_string()))
    }

    /// The transport document as a JSON value, for embedding in API
    /// request bodies.
    pub fn to_json_value(&self, network: Network) -> Result<Value, AuctionFormatError> {
        serde_json::to_value(self.to_file(network)?)
            .map_err(|e| AuctionFormatError::Malformed(e.to_string()))
    }

    fn to_file(&self, network: Network) -> Result<AuctionFile, AuctionFormatError> {
        Ok(AuctionFile {
            version: self.version(),
            name: self.name().to_string(),
            locking_tx_hash: self.locking_tx_hash(),
            locking_output_idx: self.locking_output_idx(),
            public_key: *self.public_key(),
            payment_addr: self.payment_addr().encode(network)?,
            fee_addr: self.fee_addr().map(|a| a.encode(network)).transpose()?,
            data: self.data().to_vec(),
        })
    }

    /// Parse a transport document, refusing legacy layouts and versions
    /// older than [`MINIMUM_AUCTION_VERSION`]. Entries are re-sorted by
    /// descending price whatever order the file used.
    pub fn from_json(input: &str, network: Network) -> Result<Auction, AuctionFormatError> {
        let trimmed = input.trim();
        if let Some(first) = trimmed.lines().next() {
            if is_magic_header(first.trim()) {
                return Err(AuctionFormatError::LegacyMagicHeader {
                    header: first.trim().to_string(),
                });
            }
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) if is_ndjson(trimmed) => return Err(AuctionFormatError::LegacyNdjson),
            Err(e) => return Err(AuctionFormatError::InvalidJson(e.to_string())),
        };

        check_version(&value)?;

        let file: AuctionFile =
            serde_json::from_value(value).map_err(|e| AuctionFormatError::Malformed(e.to_string()))?;
        let payment_addr = Address::decode(&file.payment_addr, network)?;
        let fee_addr = file
            .fee_addr
            .as_deref()
            .map(|a| Address::decode(a, network))
            .transpose()?;

        debug!(name = %file.name, proofs = file.data.len(), "parsed auction file");
        Ok(Auction::new(
            file.name,
            Outpoint::new(file.locking_tx_hash, file.locking_output_idx),
            file.public_key,
            payment_addr,
            fee_addr,
            file.data,
        )?)
    }
}

fn check_version(value: &Value) -> Result<(), AuctionFormatError> {
    let version = match value.get("version") {
        None | Some(Value::Null) => return Err(AuctionFormatError::MissingVersion),
        Some(Value::Number(n)) => n,
        Some(_) => return Err(AuctionFormatError::NonNumericVersion),
    };
    match version.as_u64() {
        Some(v) if v >= MINIMUM_AUCTION_VERSION => Ok(()),
        _ => Err(AuctionFormatError::UnsupportedVersion {
            version: version.to_string(),
            minimum: MINIMUM_AUCTION_VERSION,
        }),
    }
}

/// `SOME_MAGIC:1.2.3`
fn is_magic_header(line: &str) -> bool {
    let Some((magic, version)) = line.split_once(':') else {
        return false;
    };
    let magic_ok = !magic.is_empty() && magic.chars().all(|c| c.is_ascii_uppercase() || c == '_');
    let parts: Vec<&str> = version.split('.').collect();
    let version_ok = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    magic_ok && version_ok
}

/// Two or more lines that are each a JSON value on their own.
fn is_ndjson(input: &str) -> bool {
    let lines: Vec<&str> = input.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines.len() > 1
        && lines
            .iter()
            .all(|l| serde_json::from_str::<Value>(l).is_ok())
}
