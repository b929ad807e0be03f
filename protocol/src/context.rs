//! # Protocol Context
//!
//! Everything the swap protocol needs from the outside world, injected as
//! trait objects. The ledger node answers questions about the chain and
//! accepts broadcasts; the wallet holds the user's ordinary funds and signs
//! for them. Neither is implemented here: production code plugs in RPC
//! clients, tests plug in an in-memory chain.
//!
//! Absence is data, not failure. `get_coin` returning `Ok(None)` means "spent
//! or never existed", and callers act on it. `Err` means the collaborator
//! could not answer at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::{Address, Coin, MutableTx, Outpoint, Transaction, TxHash};
use crate::config::{Network, MIN_NETWORK_FEE_RATE};
use crate::error::ServiceError;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A transaction as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub tx: Transaction,
    /// Confirmation height; `None` while in the mempool.
    pub height: Option<u32>,
    /// Block time (Unix seconds) if confirmed, else first-seen time.
    pub mtime: u64,
}

/// The ledger's view of a registered name, as needed to build `FINALIZE`
/// covenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInfo {
    pub name: String,
    /// Height at which the name was registered.
    pub height: u32,
    /// Reserved-name claim height, 0 if unclaimed.
    pub claimed: u32,
    pub renewals: u32,
    /// Weak (non-DNSSEC) claim.
    pub weak: bool,
}

#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn get_coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ServiceError>;

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<TxRecord>, ServiceError>;

    async fn get_chain_height(&self) -> Result<u32, ServiceError>;

    /// Median time past of the chain tip, Unix seconds.
    async fn get_median_time(&self) -> Result<u64, ServiceError>;

    async fn get_block_hash(&self, height: u32) -> Result<Option<[u8; 32]>, ServiceError>;

    async fn get_name_info(&self, name: &str) -> Result<Option<NameInfo>, ServiceError>;

    /// Unspent coins currently held by `address`.
    async fn get_coins_by_address(&self, address: &Address) -> Result<Vec<Coin>, ServiceError>;

    /// Smart fee estimate, per kilobyte.
    async fn estimate_fee_rate(&self) -> Result<u64, ServiceError>;

    async fn broadcast(&self, tx: &Transaction) -> Result<TxHash, ServiceError>;
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WalletService: Send + Sync {
    /// A fresh receive address owned by the wallet.
    async fn create_address(&self) -> Result<Address, ServiceError>;

    /// Add wallet inputs (and a change output, if needed) until the inputs
    /// cover the outputs plus the fee at `fee_rate`. Existing inputs and
    /// outputs are preserved, though their order may not be.
    async fn fund_transaction(&self, mtx: MutableTx, fee_rate: u64) -> Result<MutableTx, ServiceError>;

    /// Sign every wallet-owned input at index `start` or later with
    /// `SIGHASH_ALL`.
    async fn sign_inputs_from(&self, start: usize, mtx: MutableTx) -> Result<MutableTx, ServiceError>;

    /// Send a wallet-owned name to `to` with a `TRANSFER` covenant.
    async fn send_transfer(&self, name: &str, to: &Address) -> Result<Transaction, ServiceError>;

    /// Finalize a wallet-owned name whose transfer lockup has elapsed.
    async fn send_finalize(&self, name: &str) -> Result<Transaction, ServiceError>;
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Shared handle to the collaborators. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    ledger: Arc<dyn LedgerService>,
    wallet: Arc<dyn WalletService>,
    network: Network,
}

impl Context {
    pub fn new(
        network: Network,
        ledger: Arc<dyn LedgerService>,
        wallet: Arc<dyn WalletService>,
    ) -> Self {
        Self {
            ledger,
            wallet,
            network,
        }
    }

    pub fn ledger(&self) -> &dyn LedgerService {
        self.ledger.as_ref()
    }

    pub fn wallet(&self) -> &dyn WalletService {
        self.wallet.as_ref()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The node's fee estimate, floored at [`MIN_NETWORK_FEE_RATE`].
    pub async fn fee_rate(&self) -> Result<u64, ServiceError> {
        let estimate = self.ledger.estimate_fee_rate().await?;
        Ok(estimate.max(MIN_NETWORK_FEE_RATE))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
