//! In-memory ledger and wallet for integration tests.
//!
//! The ledger is strict where it matters: every broadcast input must exist,
//! pass `verify_input`, and the transaction must be final at the next block.
//! Everything else (covenant consensus, fees) is trusted.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use namedex_protocol::chain::{
    hash_name, signature_hash, Address, Coin, Covenant, CovenantKind, MutableTx, Outpoint, Output,
    SighashType, Transaction, TxHash,
};
use namedex_protocol::config::{Network, SEQUENCE_FINAL};
use namedex_protocol::context::{Context, LedgerService, NameInfo, TxRecord, WalletService};
use namedex_protocol::crypto::{blake3_hash, LockKeypair};
use namedex_protocol::error::ServiceError;
use namedex_protocol::lock::NameLockFinalize;
use namedex_protocol::script::{verify_input, Script};
use namedex_protocol::service;

pub const NETWORK: Network = Network::Regtest;

/// Flat network fee the mock wallet adds when funding.
pub const NETWORK_FEE: u64 = 1_000;

/// Median time the chain starts at.
pub const GENESIS_TIME: u64 = 1_700_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChainState {
    height: u32,
    median_time: u64,
    coins: HashMap<Outpoint, Coin>,
    txs: HashMap<TxHash, TxRecord>,
    mempool: Vec<TxHash>,
    names: HashMap<String, NameInfo>,
    nonce: u64,
}

impl ChainState {
    fn synthetic_hash(&mut self) -> TxHash {
        self.nonce += 1;
        TxHash::from_bytes(blake3_hash(&self.nonce.to_le_bytes()))
    }
}

pub struct MockLedger {
    state: Mutex<ChainState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                height: 200,
                median_time: GENESIS_TIME,
                ..Default::default()
            }),
        })
    }

    pub fn height(&self) -> u32 {
        self.state.lock().height
    }

    pub fn median_time(&self) -> u64 {
        self.state.lock().median_time
    }

    pub fn set_median_time(&self, time: u64) {
        self.state.lock().median_time = time;
    }

    /// Confirm everything in the mempool in the next block, then add
    /// `n - 1` empty blocks. Each block advances median time by 10 minutes.
    pub fn mine(&self, n: u32) {
        let mut state = self.state.lock();
        for i in 0..n {
            state.height += 1;
            state.median_time += 600;
            if i == 0 {
                let height = state.height;
                let mtime = state.median_time;
                let pending = std::mem::take(&mut state.mempool);
                for hash in pending {
                    if let Some(record) = state.txs.get_mut(&hash) {
                        record.height = Some(height);
                        record.mtime = mtime;
                    }
                    for coin in state.coins.values_mut() {
                        if coin.hash == hash {
                            coin.height = Some(height);
                        }
                    }
                }
            }
        }
    }

    /// Drop a confirmed plain-value coin at `address`.
    pub fn fund(&self, address: &Address, value: u64) -> Coin {
        let mut state = self.state.lock();
        let coin = Coin {
            hash: state.synthetic_hash(),
            index: 0,
            value,
            address: address.clone(),
            covenant: Covenant::none(),
            height: Some(state.height),
        };
        state.coins.insert(coin.outpoint(), coin.clone());
        coin
    }

    /// Register `name` to `owner`, as if its auction had already closed.
    pub fn register_name(&self, name: &str, owner: &Address) -> Coin {
        let mut state = self.state.lock();
        let height = state.height;
        let mut covenant = Covenant::new(CovenantKind::Register);
        covenant.push_bytes(&hash_name(name));
        covenant.push_u32(height);
        let coin = Coin {
            hash: state.synthetic_hash(),
            index: 0,
            value: 0,
            address: owner.clone(),
            covenant,
            height: Some(height),
        };
        state.coins.insert(coin.outpoint(), coin.clone());
        state.names.insert(
            name.to_string(),
            NameInfo {
                name: name.to_string(),
                height,
                claimed: 0,
                renewals: 0,
                weak: false,
            },
        );
        coin
    }

    /// Unspent coins (confirmed or not) at `address`.
    pub fn coins_at(&self, address: &Address) -> Vec<Coin> {
        let state = self.state.lock();
        let mut coins: Vec<_> = state
            .coins
            .values()
            .filter(|c| &c.address == address)
            .cloned()
            .collect();
        coins.sort_by_key(|c| (c.hash, c.index));
        coins
    }

    /// The unspent coin currently holding `name`, whatever its covenant.
    pub fn name_coin(&self, name: &str) -> Option<Coin> {
        let hash = hash_name(name);
        self.state
            .lock()
            .coins
            .values()
            .find(|c| c.covenant.is_name() && c.covenant.name_hash() == Some(hash))
            .cloned()
    }

    fn accept(&self, tx: &Transaction) -> Result<TxHash, ServiceError> {
        let mut state = self.state.lock();

        if !tx.is_final(state.height + 1, state.median_time) {
            return Err(ServiceError::Rejected("non-final transaction".into()));
        }

        let mut input_value = 0u64;
        for (index, input) in tx.inputs.iter().enumerate() {
            let coin = state
                .coins
                .get(&input.prevout)
                .ok_or_else(|| ServiceError::Rejected(format!("missing or spent input {}", input.prevout)))?;
            verify_input(tx, index, coin)
                .map_err(|e| ServiceError::Rejected(format!("input {index}: {e}")))?;
            input_value += coin.value;
        }
        if input_value < tx.output_value() {
            return Err(ServiceError::Rejected("outputs exceed inputs".into()));
        }

        let hash = tx.hash();
        for input in &tx.inputs {
            state.coins.remove(&input.prevout);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            let coin = Coin::from_output(hash, index as u32, output, None);
            state.coins.insert(coin.outpoint(), coin);
        }
        let mtime = state.median_time;
        state.txs.insert(
            hash,
            TxRecord {
                tx: tx.clone(),
                height: None,
                mtime,
            },
        );
        state.mempool.push(hash);
        Ok(hash)
    }
}

#[async_trait]
impl LedgerService for MockLedger {
    async fn get_coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ServiceError> {
        Ok(self.state.lock().coins.get(outpoint).cloned())
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<TxRecord>, ServiceError> {
        Ok(self.state.lock().txs.get(hash).cloned())
    }

    async fn get_chain_height(&self) -> Result<u32, ServiceError> {
        Ok(self.height())
    }

    async fn get_median_time(&self) -> Result<u64, ServiceError> {
        Ok(self.median_time())
    }

    async fn get_block_hash(&self, height: u32) -> Result<Option<[u8; 32]>, ServiceError> {
        if height > self.height() {
            return Ok(None);
        }
        Ok(Some(blake3_hash(&height.to_le_bytes())))
    }

    async fn get_name_info(&self, name: &str) -> Result<Option<NameInfo>, ServiceError> {
        Ok(self.state.lock().names.get(name).cloned())
    }

    async fn get_coins_by_address(&self, address: &Address) -> Result<Vec<Coin>, ServiceError> {
        Ok(self.coins_at(address))
    }

    async fn estimate_fee_rate(&self) -> Result<u64, ServiceError> {
        Ok(1_000)
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<TxHash, ServiceError> {
        self.accept(tx)
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A key-hash wallet over the mock ledger.
///
/// Funding deliberately puts its own inputs and change in FRONT of whatever
/// the caller built, so code that cares about input/output positions has to
/// put them back.
pub struct MockWallet {
    ledger: Arc<MockLedger>,
    keys: Mutex<HashMap<Vec<u8>, LockKeypair>>,
}

impl MockWallet {
    pub fn new(ledger: Arc<MockLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            keys: Mutex::new(HashMap::new()),
        })
    }

    pub fn new_address(&self) -> Address {
        let kp = LockKeypair::generate();
        let address = Address::from_public_key(&kp.public_key());
        self.keys.lock().insert(address.hash().to_vec(), kp);
        address
    }

    pub fn owns(&self, address: &Address) -> bool {
        address.is_key_hash() && self.keys.lock().contains_key(address.hash())
    }

    /// Total plain value held by the wallet.
    pub fn balance(&self) -> u64 {
        let keys: Vec<Vec<u8>> = self.keys.lock().keys().cloned().collect();
        keys.iter()
            .filter_map(|h| Address::new(0, h.clone()).ok())
            .flat_map(|a| self.ledger.coins_at(&a))
            .filter(|c| c.covenant.kind == CovenantKind::None)
            .map(|c| c.value)
            .sum()
    }

    fn spendable(&self, exclude: &MutableTx) -> Vec<Coin> {
        let keys: Vec<Vec<u8>> = self.keys.lock().keys().cloned().collect();
        let mut coins: Vec<Coin> = keys
            .iter()
            .filter_map(|h| Address::new(0, h.clone()).ok())
            .flat_map(|a| self.ledger.coins_at(&a))
            .filter(|c| c.covenant.kind == CovenantKind::None)
            .filter(|c| !exclude.tx.inputs.iter().any(|i| i.prevout == c.outpoint()))
            .collect();
        coins.sort_by(|a, b| b.value.cmp(&a.value));
        coins
    }

    fn fund(&self, mut mtx: MutableTx) -> Result<MutableTx, ServiceError> {
        let needed = mtx.tx.output_value() + NETWORK_FEE;
        let mut added = Vec::new();
        for coin in self.spendable(&mtx) {
            if mtx.input_value() >= needed {
                break;
            }
            mtx.add_coin(coin, SEQUENCE_FINAL);
            added.push(mtx.tx.inputs.len() - 1);
        }
        let have = mtx.input_value();
        if have < needed {
            return Err(ServiceError::Wallet(format!(
                "insufficient funds: have {have}, need {needed}"
            )));
        }

        // Funding inputs go first.
        for (moved, pos) in added.into_iter().enumerate() {
            let input = mtx.tx.inputs.remove(pos);
            mtx.tx.inputs.insert(moved, input);
        }
        if have > needed {
            let change = Output::new(have - needed, self.new_address());
            mtx.tx.outputs.insert(0, change);
        }
        Ok(mtx)
    }

    fn sign_from(&self, start: usize, mut mtx: MutableTx) -> Result<MutableTx, ServiceError> {
        let keys = self.keys.lock();
        for index in start..mtx.tx.inputs.len() {
            let Some(coin) = mtx.coin(index).cloned() else {
                continue;
            };
            let Some(kp) = keys.get(coin.address.hash()).filter(|_| coin.address.is_key_hash()) else {
                continue;
            };
            let script = Script::pay_to_key_hash(coin.address.hash()).encode();
            let digest = signature_hash(&mtx.tx, index, &script, coin.value, SighashType::ALL)
                .ok_or_else(|| ServiceError::Wallet("missing input".into()))?;
            let mut sig = kp.sign(&digest).to_vec();
            sig.push(SighashType::ALL.to_byte());
            mtx.tx.inputs[index].witness = vec![sig, kp.public_key().as_bytes().to_vec()];
        }
        Ok(mtx)
    }

    fn owned_name_coin(&self, name: &str, kind: CovenantKind) -> Result<Coin, ServiceError> {
        self.ledger
            .name_coin(name)
            .filter(|c| c.covenant.kind == kind && self.owns(&c.address))
            .ok_or_else(|| ServiceError::Wallet(format!("wallet holds no {kind} for {name}")))
    }

    fn send(&self, mtx: MutableTx) -> Result<Transaction, ServiceError> {
        let funded = self.fund(mtx)?;
        let signed = self.sign_from(0, funded)?;
        self.ledger.accept(&signed.tx)?;
        Ok(signed.into_tx())
    }
}

#[async_trait]
impl WalletService for MockWallet {
    async fn create_address(&self) -> Result<Address, ServiceError> {
        Ok(self.new_address())
    }

    async fn fund_transaction(&self, mtx: MutableTx, _fee_rate: u64) -> Result<MutableTx, ServiceError> {
        self.fund(mtx)
    }

    async fn sign_inputs_from(&self, start: usize, mtx: MutableTx) -> Result<MutableTx, ServiceError> {
        self.sign_from(start, mtx)
    }

    async fn send_transfer(&self, name: &str, to: &Address) -> Result<Transaction, ServiceError> {
        let coin = self
            .owned_name_coin(name, CovenantKind::Register)
            .or_else(|_| self.owned_name_coin(name, CovenantKind::Finalize))?;
        let height = coin.covenant.height().unwrap_or_default();

        let mut mtx = MutableTx::new();
        mtx.add_coin(coin.clone(), SEQUENCE_FINAL);
        mtx.add_output(Output {
            value: coin.value,
            address: coin.address.clone(),
            covenant: Covenant::transfer(&hash_name(name), height, to),
        });
        self.send(mtx)
    }

    async fn send_finalize(&self, name: &str) -> Result<Transaction, ServiceError> {
        let coin = self.owned_name_coin(name, CovenantKind::Transfer)?;
        let to = coin
            .covenant
            .transfer_address()
            .ok_or_else(|| ServiceError::Wallet("malformed transfer".into()))?;
        let height = coin.covenant.height().unwrap_or_default();

        let mut covenant = Covenant::new(CovenantKind::Finalize);
        covenant.push_bytes(&hash_name(name));
        covenant.push_u32(height);
        covenant.push_bytes(name.as_bytes());
        covenant.push_u8(0);
        covenant.push_u32(0);
        covenant.push_u32(0);
        covenant.push_bytes(&blake3_hash(&height.to_le_bytes()));

        let mut mtx = MutableTx::new();
        mtx.add_coin(coin.clone(), SEQUENCE_FINAL);
        mtx.add_output(Output {
            value: coin.value,
            address: to,
            covenant,
        });
        self.send(mtx)
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// One participant: a wallet plus a context wired to the shared ledger.
pub struct Party {
    pub wallet: Arc<MockWallet>,
    pub ctx: Context,
}

impl Party {
    pub fn new(ledger: &Arc<MockLedger>, funds: u64) -> Self {
        let wallet = MockWallet::new(Arc::clone(ledger));
        if funds > 0 {
            let addr = wallet.new_address();
            ledger.fund(&addr, funds);
        }
        let ctx = Context::new(NETWORK, ledger.clone(), wallet.clone());
        Self { wallet, ctx }
    }
}

/// A seller holding `name`, plus a funded buyer, on a fresh chain.
pub struct Market {
    pub ledger: Arc<MockLedger>,
    pub seller: Party,
    pub buyer: Party,
}

impl Market {
    pub fn new(name: &str) -> Self {
        init_tracing();
        let ledger = MockLedger::new();
        let seller = Party::new(&ledger, 100_000);
        let buyer = Party::new(&ledger, 50_000_000);
        let owner = seller.wallet.new_address();
        ledger.register_name(name, &owner);
        Self {
            ledger,
            seller,
            buyer,
        }
    }
}

impl Market {
    /// Transfer the seller's name into a fresh lock script and finalize it,
    /// mining through the transfer lockup.
    pub async fn lock(&self, name: &str) -> NameLockFinalize {
        let transfer = service::transfer_name_lock(&self.seller.ctx, name)
            .await
            .expect("transfer into lock");
        self.ledger.mine(NETWORK.transfer_lockup() + 2);
        let lock = service::finalize_name_lock(&self.seller.ctx, &transfer)
            .await
            .expect("finalize into lock");
        self.ledger.mine(1);
        lock
    }
}
