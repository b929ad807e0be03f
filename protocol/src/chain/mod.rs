//! # Name Ledger Primitives
//!
//! The slice of the name ledger's data model that swaps touch: names,
//! addresses, covenants, transactions and signature hashes. We do not
//! validate blocks or run consensus; the ledger node does that. These types
//! exist so we can build transactions the node will accept.

pub mod address;
pub mod covenant;
pub mod name;
pub mod sighash;
pub mod transaction;

pub use address::Address;
pub use covenant::{Covenant, CovenantKind};
pub use name::{hash_name, validate_name, verify_name};
pub use sighash::{signature_hash, SighashBase, SighashType};
pub use transaction::{Coin, CoinView, Input, MutableTx, Outpoint, Output, Transaction, TxHash};
