//! # Name Lifecycle States
//!
//! A name's state is never stored. It is recomputed on every query from
//! which lifecycle records exist for the name's current version:
//!
//! ```text
//! outbound:  EXTERNAL_TRANSFER ─┐
//!                               ├─> FINALIZE ─> AUCTION
//!            TRANSFER ──────────┘      │           │
//!                                      └─────┬─────┘
//!                                            v
//!                               CANCEL_TRANSFER ─> CANCEL_FINALIZE
//!
//! inbound:   FILL ─> FINALIZE
//! ```
//!
//! Records are only ever written in that order, so "latest stored" and
//! "furthest along" are the same thing. Derivation is a precedence check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seller-side lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundState {
    ExternalTransfer,
    Transfer,
    Finalize,
    Auction,
    CancelTransfer,
    CancelFinalize,
}

impl OutboundState {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboundState::ExternalTransfer => "EXTERNAL_TRANSFER",
            OutboundState::Transfer => "TRANSFER",
            OutboundState::Finalize => "FINALIZE",
            OutboundState::Auction => "AUCTION",
            OutboundState::CancelTransfer => "CANCEL_TRANSFER",
            OutboundState::CancelFinalize => "CANCEL_FINALIZE",
        }
    }

    /// Only our own transfers can be finalized by us. External transfers are
    /// finalized by whoever sent them.
    pub fn can_finalize(self) -> bool {
        self == OutboundState::Transfer
    }

    /// An auction can be (re)created once the name sits in the lock script.
    pub fn can_create_auction(self) -> bool {
        matches!(
            self,
            OutboundState::ExternalTransfer | OutboundState::Finalize | OutboundState::Auction
        )
    }

    pub fn can_cancel(self) -> bool {
        matches!(self, OutboundState::Finalize | OutboundState::Auction)
    }

    pub fn can_finalize_cancel(self) -> bool {
        self == OutboundState::CancelTransfer
    }

    /// Nothing more happens to this listing. A new lock starts a new version.
    pub fn is_terminal(self) -> bool {
        self == OutboundState::CancelFinalize
    }
}

impl fmt::Display for OutboundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buyer-side lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundState {
    Fill,
    Finalize,
}

impl InboundState {
    pub fn as_str(self) -> &'static str {
        match self {
            InboundState::Fill => "FILL",
            InboundState::Finalize => "FINALIZE",
        }
    }

    pub fn can_finalize(self) -> bool {
        self == InboundState::Fill
    }
}

impl fmt::Display for InboundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Which outbound records exist for one name at one version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundRecords {
    pub external_transfer: bool,
    pub transfer: bool,
    pub finalize: bool,
    pub auction: bool,
    pub cancel_transfer: bool,
    pub cancel_finalize: bool,
}

/// Which inbound records exist for one name at one version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundRecords {
    pub fill: bool,
    pub finalize: bool,
}

pub fn derive_outbound(records: &OutboundRecords) -> Option<OutboundState> {
    let precedence = [
        (records.cancel_finalize, OutboundState::CancelFinalize),
        (records.cancel_transfer, OutboundState::CancelTransfer),
        (records.auction, OutboundState::Auction),
        (records.finalize, OutboundState::Finalize),
        (records.transfer, OutboundState::Transfer),
        (records.external_transfer, OutboundState::ExternalTransfer),
    ];
    precedence
        .into_iter()
        .find_map(|(present, state)| present.then_some(state))
}

pub fn derive_inbound(records: &InboundRecords) -> Option<InboundState> {
    if records.finalize {
        Some(InboundState::Finalize)
    } else if records.fill {
        Some(InboundState::Fill)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_follows_latest_record() {
        let mut r = OutboundRecords::default();
        assert_eq!(derive_outbound(&r), None);

        r.transfer = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::Transfer));
        r.finalize = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::Finalize));
        r.auction = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::Auction));
        r.cancel_transfer = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::CancelTransfer));
        r.cancel_finalize = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::CancelFinalize));
    }

    #[test]
    fn external_transfer_path() {
        let mut r = OutboundRecords {
            external_transfer: true,
            ..Default::default()
        };
        let state = derive_outbound(&r).unwrap();
        assert_eq!(state, OutboundState::ExternalTransfer);
        assert!(state.can_create_auction());
        assert!(!state.can_finalize());

        r.auction = true;
        assert_eq!(derive_outbound(&r), Some(OutboundState::Auction));
    }

    #[test]
    fn transitions_allowed_per_state() {
        use OutboundState::*;
        assert!(Transfer.can_finalize());
        assert!(!Transfer.can_create_auction());
        assert!(Finalize.can_cancel() && Auction.can_cancel());
        assert!(!CancelTransfer.can_cancel());
        assert!(CancelTransfer.can_finalize_cancel());
        assert!(CancelFinalize.is_terminal());
    }

    #[test]
    fn inbound() {
        let mut r = InboundRecords::default();
        assert_eq!(derive_inbound(&r), None);
        r.fill = true;
        assert_eq!(derive_inbound(&r), Some(InboundState::Fill));
        assert!(InboundState::Fill.can_finalize());
        r.finalize = true;
        assert_eq!(derive_inbound(&r), Some(InboundState::Finalize));
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&OutboundState::CancelFinalize).unwrap(),
            "\"CANCEL_FINALIZE\""
        );
        assert_eq!(OutboundState::ExternalTransfer.to_string(), "EXTERNAL_TRANSFER");
    }
}
