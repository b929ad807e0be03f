//! Ledger transaction primitives.
//!
//! Just enough of the UTXO model to build, sign and inspect swap
//! transactions: outpoints, inputs, outputs, coins, and a mutable
//! transaction that carries the coins it spends.
//!
//! The transaction hash is BLAKE3 over the witness-less encoding, so adding
//! signatures never changes it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::address::Address;
use super::covenant::Covenant;
use crate::config::{LOCKTIME_THRESHOLD, SEQUENCE_FINAL, TX_VERSION};
use crate::crypto::blake3_hash;
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Hashes & Outpoints
// ---------------------------------------------------------------------------

/// A 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const ZERO: TxHash = TxHash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ValidationError::InvalidHex {
            field: "txHash",
            reason,
        };
        let bytes = hex::decode(s).map_err(|e| invalid(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| invalid("expected 32 bytes".to_string()))?;
        Ok(Self(arr))
    }
}

impl Serialize for TxHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a specific transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    pub hash: TxHash,
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: TxHash, index: u32) -> Self {
        Self { hash, index }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hash, self.index)
    }
}

// ---------------------------------------------------------------------------
// Inputs, Outputs, Coins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub prevout: Outpoint,
    #[serde(with = "witness_hex")]
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

impl Input {
    pub fn new(prevout: Outpoint) -> Self {
        Self {
            prevout,
            witness: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: u64,
    pub address: Address,
    pub covenant: Covenant,
}

impl Output {
    /// A plain value output.
    pub fn new(value: u64, address: Address) -> Self {
        Self {
            value,
            address,
            covenant: Covenant::none(),
        }
    }
}

/// An unspent output as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub hash: TxHash,
    pub index: u32,
    pub value: u64,
    pub address: Address,
    pub covenant: Covenant,
    /// Confirmation height; `None` while unconfirmed.
    pub height: Option<u32>,
}

impl Coin {
    pub fn from_output(hash: TxHash, index: u32, output: &Output, height: Option<u32>) -> Self {
        Self {
            hash,
            index,
            value: output.value,
            address: output.address.clone(),
            covenant: output.covenant.clone(),
            height,
        }
    }

    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.hash, self.index)
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }
}

impl Transaction {
    /// Witness-less hash. Stable across signing.
    pub fn hash(&self) -> TxHash {
        TxHash(blake3_hash(&self.encode(false)))
    }

    /// Canonical byte encoding. Integers are little-endian, variable-length
    /// fields are u32-length-prefixed.
    pub fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.inputs.len() * 48 + self.outputs.len() * 64);
        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.prevout.hash.as_bytes());
            buf.extend_from_slice(&input.prevout.index.to_le_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            encode_output(output, &mut buf);
        }

        buf.extend_from_slice(&self.locktime.to_le_bytes());

        if with_witness {
            for input in &self.inputs {
                buf.extend_from_slice(&(input.witness.len() as u32).to_le_bytes());
                for item in &input.witness {
                    buf.extend_from_slice(&(item.len() as u32).to_le_bytes());
                    buf.extend_from_slice(item);
                }
            }
        }

        buf
    }

    /// Hex of the full encoding, witnesses included.
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode(true))
    }

    /// Size in bytes of the full encoding. Used for fee estimation.
    pub fn size(&self) -> usize {
        self.encode(true).len()
    }

    /// Whether consensus would accept this transaction at the given chain
    /// height and median time past.
    ///
    /// A zero lock time, or an all-final set of input sequences, is always
    /// final. Otherwise heights are compared strictly below the next block
    /// and times strictly below median time past.
    pub fn is_final(&self, height: u32, median_time: u64) -> bool {
        if self.locktime == 0 {
            return true;
        }
        let reached = if self.locktime < LOCKTIME_THRESHOLD {
            self.locktime < height
        } else {
            u64::from(self.locktime) < median_time
        };
        reached || self.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL)
    }

    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

pub(crate) fn encode_output(output: &Output, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    buf.push(output.address.version());
    buf.extend_from_slice(&(output.address.hash().len() as u32).to_le_bytes());
    buf.extend_from_slice(output.address.hash());
    output.covenant.encode_into(buf);
}

// ---------------------------------------------------------------------------
// Mutable Transaction
// ---------------------------------------------------------------------------

/// The coins a mutable transaction spends, keyed by outpoint.
#[derive(Debug, Clone, Default)]
pub struct CoinView {
    coins: HashMap<Outpoint, Coin>,
}

impl CoinView {
    pub fn add(&mut self, coin: Coin) {
        self.coins.insert(coin.outpoint(), coin);
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

/// A transaction under construction, together with the coins it spends so
/// that signers can look up values and scripts.
#[derive(Debug, Clone, Default)]
pub struct MutableTx {
    pub tx: Transaction,
    pub view: CoinView,
}

impl MutableTx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `coin`, with the given sequence.
    pub fn add_coin(&mut self, coin: Coin, sequence: u32) -> &mut Input {
        let mut input = Input::new(coin.outpoint());
        input.sequence = sequence;
        self.view.add(coin);
        self.tx.inputs.push(input);
        let last = self.tx.inputs.len() - 1;
        &mut self.tx.inputs[last]
    }

    pub fn add_output(&mut self, output: Output) {
        self.tx.outputs.push(output);
    }

    /// The coin spent by input `index`, if known.
    pub fn coin(&self, index: usize) -> Option<&Coin> {
        self.view.get(&self.tx.inputs.get(index)?.prevout)
    }

    /// Sum of known input values.
    pub fn input_value(&self) -> u64 {
        self.tx
            .inputs
            .iter()
            .filter_map(|i| self.view.get(&i.prevout))
            .map(|c| c.value)
            .sum()
    }

    /// Implied fee. Zero if outputs exceed known inputs.
    pub fn fee(&self) -> u64 {
        self.input_value().saturating_sub(self.tx.output_value())
    }

    pub fn into_tx(self) -> Transaction {
        self.tx
    }
}

mod witness_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
