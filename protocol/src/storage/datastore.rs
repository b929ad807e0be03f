//! # Data Store
//!
//! Persists lifecycle records for names we are selling (outbound) and
//! names we are buying (inbound).
//!
//! ## Key Layout
//!
//! | Key                                           | Value                       |
//! |-----------------------------------------------|-----------------------------|
//! | `{net}/names/{dir}/list/{name}`               | current version (8B BE u64) |
//! | `{net}/names/{dir}/{kind}/{name}/{version}`   | JSON record                 |
//! | `meta/migration`                              | last applied migration      |
//!
//! `{net}` is the network the store was opened for, so one database can
//! hold regtest experiments next to mainnet listings without them ever
//! seeing each other. `{dir}` is `outbound` or `inbound`.
//!
//! A name can be listed, cancelled and listed again; each listing gets a
//! fresh version so old records never get in the way. Starting a listing
//! (transfer or external transfer) or a purchase (fill) bumps the version;
//! every later step writes under the current one. The bump and the record
//! land in one atomic batch.
//!
//! Auctions are stored as their transport JSON, so what we persist is
//! exactly what we would hand to a buyer.
//!
//! ## Migrations
//!
//! Stores written before keys carried a network hold bare `names/...`
//! keys. [`DataStore::open`] moves those under the network it is opened
//! with, once, and records that in `meta/migration`.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::{KvBackend, SledBackend, StoreError, StoreResult, WriteBatch};
use super::state::{derive_inbound, derive_outbound, InboundRecords, InboundState, OutboundRecords, OutboundState};
use crate::auction::Auction;
use crate::config::Network;
use crate::lock::{
    NameLockCancelFinalize, NameLockCancelTransfer, NameLockExternalTransfer, NameLockFinalize,
    NameLockTransfer,
};
use crate::swap::{SwapFill, SwapFinalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

// Record kinds, as they appear in keys.
const TRANSFER: &str = "transfer";
const EXTERNAL_TRANSFER: &str = "external_transfer";
const FINALIZE: &str = "finalize";
const AUCTION: &str = "auction";
const CANCEL_TRANSFER: &str = "cancel_transfer";
const CANCEL_FINALIZE: &str = "cancel_finalize";
const FILL: &str = "fill";

const MIGRATION_KEY: &str = "meta/migration";
const LEGACY_PREFIX: &str = "names/";

// Migrations, in the order they run.
const MIGRATION_INITIAL: &str = "initial";
const MIGRATION_NETWORK_SETUP: &str = "network_setup";

/// Versioned store of lifecycle records.
pub struct DataStore {
    backend: Arc<dyn KvBackend>,
    network: Network,
    /// Serializes read-modify-write of version counters.
    write_lock: Mutex<()>,
}

impl DataStore {
    pub fn new(backend: Arc<dyn KvBackend>, network: Network) -> Self {
        Self {
            backend,
            network,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a sled-backed store at `path`, migrating older layouts into
    /// `network`.
    pub fn open<P: AsRef<Path>>(path: P, network: Network) -> StoreResult<Self> {
        let store = Self::new(Arc::new(SledBackend::open(path)?), network);
        store.migrate()?;
        Ok(store)
    }

    /// A throwaway in-memory store.
    pub fn open_temporary(network: Network) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(SledBackend::open_temporary()?), network))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    // -- Keys ---------------------------------------------------------------

    fn list_prefix(&self, dir: Direction) -> String {
        format!("{}/names/{}/list/", self.network, dir.as_str())
    }

    fn version_key(&self, dir: Direction, name: &str) -> String {
        format!("{}{name}", self.list_prefix(dir))
    }

    fn record_key(&self, dir: Direction, kind: &str, name: &str, version: u64) -> String {
        format!("{}/names/{}/{kind}/{name}/{version}", self.network, dir.as_str())
    }

    // -- Maintenance --------------------------------------------------------

    /// Last migration applied to this store. Fresh stores report `initial`
    /// until [`migrate`](Self::migrate) runs.
    pub fn migration(&self) -> StoreResult<String> {
        match self.backend.get(MIGRATION_KEY)? {
            None => Ok(MIGRATION_INITIAL.to_string()),
            Some(raw) => {
                String::from_utf8(raw).map_err(|e| StoreError::Serialization(e.to_string()))
            }
        }
    }

    /// Bring the store up to the latest layout. Un-namespaced records from
    /// before the network split are claimed by this store's network.
    /// Returns how many keys moved.
    pub fn migrate(&self) -> StoreResult<usize> {
        let _guard = self.write_lock.lock();
        let mut moved = 0;
        loop {
            let current = self.migration()?;
            let mut batch = WriteBatch::default();
            let next = match current.as_str() {
                MIGRATION_INITIAL => {
                    for (key, value) in self.backend.scan_prefix(LEGACY_PREFIX)? {
                        batch.put(format!("{}/{key}", self.network), value);
                        batch.delete(key);
                        moved += 1;
                    }
                    MIGRATION_NETWORK_SETUP
                }
                MIGRATION_NETWORK_SETUP => return Ok(moved),
                other => return Err(StoreError::UnknownMigration(other.to_string())),
            };
            batch.put(MIGRATION_KEY, next.as_bytes().to_vec());
            self.backend.apply(batch)?;
            info!(from = %current, to = next, network = %self.network, moved, "migrated data store");
        }
    }

    /// Copy the whole store (every network) to a fresh location at `path`.
    /// Returns the number of entries written.
    pub fn backup<P: AsRef<Path>>(&self, path: P) -> StoreResult<usize> {
        let _guard = self.write_lock.lock();
        let path = path.as_ref();
        let entries = self.backend.backup_to(path)?;
        info!(path = %path.display(), entries, "backed up data store");
        Ok(entries)
    }

    // -- Versions -----------------------------------------------------------

    fn read_version(&self, dir: Direction, name: &str) -> StoreResult<Option<u64>> {
        let key = self.version_key(dir, name);
        match self.backend.get(&key)? {
            None => Ok(None),
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::CorruptCounter(key))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
        }
    }

    /// Current listing version of an outbound name.
    pub fn outbound_version(&self, name: &str) -> StoreResult<Option<u64>> {
        self.read_version(Direction::Outbound, name)
    }

    /// Current purchase version of an inbound name.
    pub fn inbound_version(&self, name: &str) -> StoreResult<Option<u64>> {
        self.read_version(Direction::Inbound, name)
    }

    /// Write `bytes` under `kind`, either at a fresh version or at the
    /// current one (version 0 if the name is new).
    fn write(
        &self,
        dir: Direction,
        kind: &str,
        name: &str,
        bytes: Vec<u8>,
        bump: bool,
    ) -> StoreResult<u64> {
        let _guard = self.write_lock.lock();
        let current = self.read_version(dir, name)?;
        let version = match (current, bump) {
            (Some(v), true) => v + 1,
            (Some(v), false) => v,
            (None, _) => 0,
        };

        let mut batch = WriteBatch::default();
        if current != Some(version) {
            batch.put(self.version_key(dir, name), version.to_be_bytes().to_vec());
        }
        batch.put(self.record_key(dir, kind, name, version), bytes);
        self.backend.apply(batch)?;

        debug!(direction = dir.as_str(), kind, %name, version, "stored record");
        Ok(version)
    }

    fn put_json<T: Serialize>(
        &self,
        dir: Direction,
        kind: &str,
        name: &str,
        record: &T,
        bump: bool,
    ) -> StoreResult<u64> {
        let bytes = serde_json::to_vec(record)?;
        self.write(dir, kind, name, bytes, bump)
    }

    fn get_raw(&self, dir: Direction, kind: &str, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.read_version(dir, name)? {
            None => Ok(None),
            Some(version) => self.backend.get(&self.record_key(dir, kind, name, version)),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        dir: Direction,
        kind: &str,
        name: &str,
    ) -> StoreResult<Option<T>> {
        self.get_raw(dir, kind, name)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn has(&self, dir: Direction, kind: &str, name: &str) -> StoreResult<bool> {
        Ok(self.get_raw(dir, kind, name)?.is_some())
    }

    // -- Outbound -----------------------------------------------------------

    /// Start a new listing with our own transfer into a lock script.
    pub fn put_lock_transfer(&self, record: &NameLockTransfer) -> StoreResult<u64> {
        self.put_json(Direction::Outbound, TRANSFER, &record.name, record, true)
    }

    pub fn get_lock_transfer(&self, name: &str) -> StoreResult<Option<NameLockTransfer>> {
        self.get_json(Direction::Outbound, TRANSFER, name)
    }

    /// Start a new listing whose transfer someone else performs.
    pub fn put_lock_external_transfer(&self, record: &NameLockExternalTransfer) -> StoreResult<u64> {
        self.put_json(Direction::Outbound, EXTERNAL_TRANSFER, &record.name, record, true)
    }

    pub fn get_lock_external_transfer(
        &self,
        name: &str,
    ) -> StoreResult<Option<NameLockExternalTransfer>> {
        self.get_json(Direction::Outbound, EXTERNAL_TRANSFER, name)
    }

    pub fn put_lock_finalize(&self, record: &NameLockFinalize) -> StoreResult<u64> {
        self.put_json(Direction::Outbound, FINALIZE, &record.name, record, false)
    }

    pub fn get_lock_finalize(&self, name: &str) -> StoreResult<Option<NameLockFinalize>> {
        self.get_json(Direction::Outbound, FINALIZE, name)
    }

    /// Store (or replace) the current listing's auction.
    pub fn put_auction(&self, auction: &Auction) -> StoreResult<u64> {
        let json = auction
            .to_json(self.network)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write(Direction::Outbound, AUCTION, auction.name(), json.into_bytes(), false)
    }

    pub fn get_auction(&self, name: &str) -> StoreResult<Option<Auction>> {
        let Some(bytes) = self.get_raw(Direction::Outbound, AUCTION, name)? else {
            return Ok(None);
        };
        let json = String::from_utf8(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Auction::from_json(&json, self.network)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn put_lock_cancel_transfer(&self, record: &NameLockCancelTransfer) -> StoreResult<u64> {
        self.put_json(Direction::Outbound, CANCEL_TRANSFER, &record.name, record, false)
    }

    pub fn get_lock_cancel_transfer(&self, name: &str) -> StoreResult<Option<NameLockCancelTransfer>> {
        self.get_json(Direction::Outbound, CANCEL_TRANSFER, name)
    }

    pub fn put_lock_cancel_finalize(&self, record: &NameLockCancelFinalize) -> StoreResult<u64> {
        self.put_json(Direction::Outbound, CANCEL_FINALIZE, &record.name, record, false)
    }

    pub fn get_lock_cancel_finalize(&self, name: &str) -> StoreResult<Option<NameLockCancelFinalize>> {
        self.get_json(Direction::Outbound, CANCEL_FINALIZE, name)
    }

    /// Derived state of an outbound name, `None` if we never listed it.
    pub fn outbound_state(&self, name: &str) -> StoreResult<Option<OutboundState>> {
        let dir = Direction::Outbound;
        let records = OutboundRecords {
            external_transfer: self.has(dir, EXTERNAL_TRANSFER, name)?,
            transfer: self.has(dir, TRANSFER, name)?,
            finalize: self.has(dir, FINALIZE, name)?,
            auction: self.has(dir, AUCTION, name)?,
            cancel_transfer: self.has(dir, CANCEL_TRANSFER, name)?,
            cancel_finalize: self.has(dir, CANCEL_FINALIZE, name)?,
        };
        Ok(derive_outbound(&records))
    }

    // -- Inbound ------------------------------------------------------------

    /// Start a new purchase record.
    pub fn put_swap_fill(&self, record: &SwapFill) -> StoreResult<u64> {
        self.put_json(Direction::Inbound, FILL, &record.name, record, true)
    }

    pub fn get_swap_fill(&self, name: &str) -> StoreResult<Option<SwapFill>> {
        self.get_json(Direction::Inbound, FILL, name)
    }

    pub fn put_swap_finalize(&self, record: &SwapFinalize) -> StoreResult<u64> {
        self.put_json(Direction::Inbound, FINALIZE, &record.name, record, false)
    }

    pub fn get_swap_finalize(&self, name: &str) -> StoreResult<Option<SwapFinalize>> {
        self.get_json(Direction::Inbound, FINALIZE, name)
    }

    pub fn inbound_state(&self, name: &str) -> StoreResult<Option<InboundState>> {
        let dir = Direction::Inbound;
        let records = InboundRecords {
            fill: self.has(dir, FILL, name)?,
            finalize: self.has(dir, FINALIZE, name)?,
        };
        Ok(derive_inbound(&records))
    }

    // -- Iteration ----------------------------------------------------------

    fn names(&self, dir: Direction) -> StoreResult<Vec<String>> {
        let prefix = self.list_prefix(dir);
        Ok(self
            .backend
            .scan_prefix(&prefix)?
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Every name we have listed, in lexicographic order.
    pub fn outbound_names(&self) -> StoreResult<Vec<String>> {
        self.names(Direction::Outbound)
    }

    /// Every name we have bought, in lexicographic order.
    pub fn inbound_names(&self) -> StoreResult<Vec<String>> {
        self.names(Direction::Inbound)
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
