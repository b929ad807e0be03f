//! # Protocol Configuration & Constants
//!
//! Every magic number in the swap protocol lives here. If you're hardcoding
//! a constant somewhere else, move it here and leave a better world behind.
//!
//! Some of these values are baked into files that sellers have already handed
//! to buyers (auction versions, the legacy magic). Changing them breaks every
//! proof file in circulation, so treat them as wire format, not tunables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Auction Transport Format
// ---------------------------------------------------------------------------

/// Version written into every auction file we produce.
pub const CURRENT_AUCTION_VERSION: u64 = 2;

/// Oldest auction file version we still accept. Version 1 files were the
/// line-oriented magic-header format and are rejected outright.
pub const MINIMUM_AUCTION_VERSION: u64 = 2;

/// Magic prefix of the obsolete `MAGIC:version\n<json>` proof format.
pub const LEGACY_PROOF_MAGIC: &str = "SHAKEDEX_PROOF";

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Marketplace fee rates are expressed in basis points of the sale price.
/// 100 = 1%. 10_000 = the marketplace takes everything, which is legal but rude.
pub const FEE_RATE_BASIS: u64 = 10_000;

/// Floor for the network fee rate used when funding transactions, in
/// dollarydoos per kilobyte. Node estimates below this are ignored.
pub const MIN_NETWORK_FEE_RATE: u64 = 5_000;

// ---------------------------------------------------------------------------
// Marketplace API
// ---------------------------------------------------------------------------

/// Fee terms a marketplace charges for listing. 404 means "no fee".
pub const MARKETPLACE_FEE_INFO_PATH: &str = "/api/v1/fee_info";

/// Where sellers upload signed auctions.
pub const MARKETPLACE_AUCTIONS_PATH: &str = "/api/v1/auctions";

/// Whole-request timeout for marketplace calls, in seconds.
pub const MARKETPLACE_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Transaction Rules
// ---------------------------------------------------------------------------

/// Transaction version used for every transaction we build.
pub const TX_VERSION: u32 = 0;

/// Sequence value marking an input as final. If every input is final, the
/// transaction's lock time is ignored by consensus.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Sequence value used on the locked input so that the lock time binds.
pub const SEQUENCE_LOCKTIME_ENABLED: u32 = SEQUENCE_FINAL - 1;

/// Lock times below this are block heights; at or above it they are Unix
/// seconds compared against median time past.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Price schedule inputs are milliseconds; lock times are seconds.
pub const MILLIS_PER_SECOND: u64 = 1_000;

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// The name ledger network a context talks to.
///
/// Each network fixes the address prefix and the name-rule intervals that the
/// lifecycle confirmation logic depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet. Mistakes here cost real names.
    Main,
    /// Public testnet.
    Testnet,
    /// Local regression-test network.
    Regtest,
    /// Local simulation network.
    Simnet,
}

impl Network {
    /// Human-readable part of bech32 addresses on this network.
    pub fn hrp(&self) -> &'static str {
        match self {
            Self::Main => "hs",
            Self::Testnet => "ts",
            Self::Regtest => "rs",
            Self::Simnet => "ss",
        }
    }

    /// Blocks a TRANSFER must sit confirmed before it can be finalized.
    pub fn transfer_lockup(&self) -> u32 {
        match self {
            Self::Main => 288,
            Self::Testnet | Self::Regtest | Self::Simnet => 10,
        }
    }

    /// Blocks between renewals; the FINALIZE covenant commits to the block
    /// hash at `height - 2 * renewal_maturity`.
    pub fn renewal_maturity(&self) -> u32 {
        match self {
            Self::Main => 4_320,
            Self::Testnet => 30,
            Self::Regtest | Self::Simnet => 50,
        }
    }

    /// Confirmations before a coinbase output may be spent.
    pub fn coinbase_maturity(&self) -> u32 {
        match self {
            Self::Main => 100,
            Self::Testnet | Self::Regtest | Self::Simnet => 2,
        }
    }

    /// Canonical lowercase name, mainly for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
            Self::Simnet => "simnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "testnet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            "simnet" => Ok(Self::Simnet),
            other => Err(ValidationError::UnknownNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_hrps_are_distinct() {
        let hrps = [
            Network::Main.hrp(),
            Network::Testnet.hrp(),
            Network::Regtest.hrp(),
            Network::Simnet.hrp(),
        ];
        for (i, a) in hrps.iter().enumerate() {
            for b in &hrps[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("regtest".parse::<Network>().unwrap(), Network::Regtest);
        assert!("moonnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_display_roundtrip() {
        for net in [Network::Main, Network::Testnet, Network::Regtest, Network::Simnet] {
            assert_eq!(net.to_string().parse::<Network>().unwrap(), net);
        }
    }

    #[test]
    fn test_version_constants_sanity() {
        assert!(MINIMUM_AUCTION_VERSION <= CURRENT_AUCTION_VERSION);
        assert_eq!(SEQUENCE_LOCKTIME_ENABLED, 0xFFFF_FFFE);
    }
}
