//! # Storage Module
//!
//! Local persistence for a node operator's listings and purchases.
//!
//! ```text
//! backend.rs   KvBackend trait, sled implementation, StoreError
//! datastore.rs versioned lifecycle records per name
//! state.rs     outbound / inbound state derivation
//! ```
//!
//! Nothing here talks to the ledger. The store remembers what we did; the
//! ledger says whether it stuck.

pub mod backend;
pub mod datastore;
pub mod state;

pub use backend::{BatchOp, KvBackend, SledBackend, StoreError, StoreResult, WriteBatch};
pub use datastore::DataStore;
pub use state::{InboundState, OutboundState};
