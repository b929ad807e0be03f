//! # Covenants
//!
//! Every output on the name ledger carries a covenant: a type tag plus a list
//! of byte items. For name outputs the first item is always the name hash, and
//! consensus rules dictate what the next covenant on the same name may be.
//! The swap protocol only ever builds two kinds itself:
//!
//! | Kind       | Items                                                                  |
//! |------------|------------------------------------------------------------------------|
//! | `TRANSFER` | name hash, height (u32), address version (u8), address hash           |
//! | `FINALIZE` | name hash, height (u32), name, flags (u8), claimed (u32), renewals (u32), block hash |
//!
//! Integers are little-endian.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;

/// Covenant type tags, numbered as the ledger numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CovenantKind {
    None = 0,
    Claim = 1,
    Open = 2,
    Bid = 3,
    Reveal = 4,
    Redeem = 5,
    Register = 6,
    Update = 7,
    Renew = 8,
    Transfer = 9,
    Finalize = 10,
    Revoke = 11,
}

impl CovenantKind {
    /// The numeric tag, as `OP_TYPE` pushes it.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use CovenantKind::*;
        Some(match value {
            0 => None,
            1 => Claim,
            2 => Open,
            3 => Bid,
            4 => Reveal,
            5 => Redeem,
            6 => Register,
            7 => Update,
            8 => Renew,
            9 => Transfer,
            10 => Finalize,
            11 => Revoke,
            _ => return Option::None,
        })
    }

    pub fn as_str(self) -> &'static str {
        use CovenantKind::*;
        match self {
            None => "NONE",
            Claim => "CLAIM",
            Open => "OPEN",
            Bid => "BID",
            Reveal => "REVEAL",
            Redeem => "REDEEM",
            Register => "REGISTER",
            Update => "UPDATE",
            Renew => "RENEW",
            Transfer => "TRANSFER",
            Finalize => "FINALIZE",
            Revoke => "REVOKE",
        }
    }
}

impl fmt::Display for CovenantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A covenant: kind plus ordered byte items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Covenant {
    pub kind: CovenantKind,
    #[serde(with = "hex_items")]
    pub items: Vec<Vec<u8>>,
}

impl Default for Covenant {
    fn default() -> Self {
        Self::none()
    }
}

impl Covenant {
    /// An empty covenant of the given kind.
    pub fn new(kind: CovenantKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    /// The covenant carried by plain value outputs.
    pub fn none() -> Self {
        Self::new(CovenantKind::None)
    }

    /// A `TRANSFER` covenant pointing the name at `to`.
    pub fn transfer(name_hash: &[u8; 32], height: u32, to: &Address) -> Self {
        let mut cov = Self::new(CovenantKind::Transfer);
        cov.push_bytes(name_hash);
        cov.push_u32(height);
        cov.push_u8(to.version());
        cov.push_bytes(to.hash());
        cov
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.items.push(bytes.to_vec());
    }

    pub fn push_u8(&mut self, value: u8) {
        self.items.push(vec![value]);
    }

    pub fn push_u32(&mut self, value: u32) {
        self.items.push(value.to_le_bytes().to_vec());
    }

    pub fn is_name(&self) -> bool {
        !matches!(self.kind, CovenantKind::None)
    }

    pub fn item(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index).map(Vec::as_slice)
    }

    /// Item 0 of every name covenant.
    pub fn name_hash(&self) -> Option<[u8; 32]> {
        self.item(0)?.try_into().ok()
    }

    /// Item 1 of every name covenant: the name's registration height.
    pub fn height(&self) -> Option<u32> {
        self.read_u32(1)
    }

    pub fn read_u32(&self, index: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.item(index)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// The raw name carried in item 2 of a `FINALIZE` covenant.
    pub fn finalized_name(&self) -> Option<&str> {
        if self.kind != CovenantKind::Finalize {
            return None;
        }
        std::str::from_utf8(self.item(2)?).ok()
    }

    /// The destination address of a `TRANSFER` covenant.
    pub fn transfer_address(&self) -> Option<Address> {
        if self.kind != CovenantKind::Transfer {
            return None;
        }
        let version = *self.item(2)?.first()?;
        Address::new(version, self.item(3)?.to_vec()).ok()
    }

    /// Canonical bytes: kind, item count, then length-prefixed items.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind.as_u8());
        buf.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        for item in &self.items {
            buf.extend_from_slice(&(item.len() as u32).to_le_bytes());
            buf.extend_from_slice(item);
        }
    }
}

mod hex_items {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::name::hash_name;

    #[test]
    fn kind_numbering_matches_ledger() {
        assert_eq!(CovenantKind::Transfer.as_u8(), 9);
        assert_eq!(CovenantKind::Finalize.as_u8(), 10);
        for tag in 0..=11u8 {
            assert_eq!(CovenantKind::from_u8(tag).unwrap().as_u8(), tag);
        }
        assert_eq!(CovenantKind::from_u8(12), None);
    }

    #[test]
    fn transfer_covenant_layout() {
        let to = Address::new(0, vec![0x11; 32]).unwrap();
        let nh = hash_name("example");
        let cov = Covenant::transfer(&nh, 1234, &to);

        assert_eq!(cov.kind, CovenantKind::Transfer);
        assert_eq!(cov.name_hash(), Some(nh));
        assert_eq!(cov.height(), Some(1234));
        assert_eq!(cov.item(2), Some(&[0u8][..]));
        assert_eq!(cov.transfer_address(), Some(to));
    }

    #[test]
    fn finalized_name_only_for_finalize() {
        let mut cov = Covenant::new(CovenantKind::Finalize);
        cov.push_bytes(&hash_name("abc"));
        cov.push_u32(1);
        cov.push_bytes(b"abc");
        assert_eq!(cov.finalized_name(), Some("abc"));

        cov.kind = CovenantKind::Transfer;
        assert_eq!(cov.finalized_name(), None);
    }

    #[test]
    fn serde_uses_hex_items() {
        let mut cov = Covenant::new(CovenantKind::Update);
        cov.push_bytes(&[0xde, 0xad]);
        let json = serde_json::to_value(&cov).unwrap();
        assert_eq!(json["kind"], "UPDATE");
        assert_eq!(json["items"][0], "dead");
    }
}
