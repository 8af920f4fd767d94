use crate::chain::{BlockStats, ChainClient, PriceOracle, TxReceipt, TxRequest};
use crate::data_sync::{RiskSensor, SensorReading};
use crate::errors::ChainError;
use crate::logic::pools::{ConstantProductPool, PoolId, PoolWrapper};
use crate::logic::types::{ArbitrageHop, ArbitragePath, FlashLoanConfig};
use crate::utils::constants::WETH;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use eyre::eyre;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn e18(value: u64) -> U256 {
    U256::from(value) * U256::from(10u64).pow(U256::from(18))
}

pub fn sample_pools() -> Vec<PoolWrapper> {
    let t1 = Address::repeat_byte(1);
    vec![
        PoolWrapper::from(ConstantProductPool::new(Address::repeat_byte(0xa1), WETH, t1, e18(10_000), e18(20_000), 30)),
        PoolWrapper::from(ConstantProductPool::new(Address::repeat_byte(0xa2), t1, WETH, e18(18_000), e18(10_000), 30)),
    ]
}

/// WETH -> T1 -> WETH over `sample_pools`, roughly 1 WETH of gross profit on 10 WETH.
pub fn sample_path(flash_loan: Option<FlashLoanConfig>) -> ArbitragePath {
    let pools = sample_pools();
    let t1 = Address::repeat_byte(1);
    let (first, gas0) = ArbitrageHop::quote(pools[0].clone(), WETH, t1, e18(10)).expect("first hop");
    let (second, gas1) = ArbitrageHop::quote(pools[1].clone(), t1, WETH, first.amount_out).expect("second hop");
    let path = ArbitragePath::new(WETH, vec![first, second], &[gas0, gas1]).expect("valid path");
    match flash_loan {
        Some(flash_loan) => path.with_flash_loan(flash_loan),
        None => path,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReceiptBehaviour {
    Success,
    Revert(Bytes),
    /// Stays pending forever.
    Pending,
}

/// Scriptable chain client. Every knob can be changed while the client is shared.
pub struct MockChainClient {
    pools: Mutex<HashMap<PoolId, PoolWrapper>>,
    fetch_fails: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    gas_price: Mutex<Option<u128>>,
    block_number: AtomicU64,
    gas_estimate: Mutex<Option<u64>>,
    simulate_revert: Mutex<Option<Bytes>>,
    simulate_delay: Mutex<Option<Duration>>,
    send_fails: AtomicBool,
    receipt: Mutex<ReceiptBehaviour>,
    receipt_delay: Mutex<Option<Duration>>,
    blocks: Mutex<Vec<BlockStats>>,
    pending: AtomicU64,
    sent: Mutex<Vec<TxRequest>>,
    fetch_calls: AtomicUsize,
    simulate_calls: AtomicUsize,
    receipt_calls: AtomicUsize,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            fetch_fails: AtomicBool::new(false),
            fetch_delay: Mutex::new(None),
            gas_price: Mutex::new(Some(20_000_000_000)),
            block_number: AtomicU64::new(1_000),
            gas_estimate: Mutex::new(Some(400_000)),
            simulate_revert: Mutex::new(None),
            simulate_delay: Mutex::new(None),
            send_fails: AtomicBool::new(false),
            receipt: Mutex::new(ReceiptBehaviour::Success),
            receipt_delay: Mutex::new(None),
            blocks: Mutex::new(Vec::new()),
            pending: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            receipt_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_pool(&self, pool: PoolWrapper) {
        lock(&self.pools).insert(pool.get_pool_id(), pool);
    }

    pub fn set_fetch_fails(&self, fails: bool) {
        self.fetch_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *lock(&self.fetch_delay) = delay;
    }

    /// `None` makes `gas_price` fail.
    pub fn set_gas_price(&self, gas_price: Option<u128>) {
        *lock(&self.gas_price) = gas_price;
    }

    /// `None` makes `estimate_gas` fail.
    pub fn set_gas_estimate(&self, estimate: Option<u64>) {
        *lock(&self.gas_estimate) = estimate;
    }

    pub fn set_simulate_revert(&self, data: Option<Bytes>) {
        *lock(&self.simulate_revert) = data;
    }

    pub fn set_simulate_delay(&self, delay: Option<Duration>) {
        *lock(&self.simulate_delay) = delay;
    }

    pub fn set_send_fails(&self, fails: bool) {
        self.send_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_receipt(&self, behaviour: ReceiptBehaviour) {
        *lock(&self.receipt) = behaviour;
    }

    /// Receipts stay pending for this long after submission.
    pub fn set_receipt_delay(&self, delay: Option<Duration>) {
        *lock(&self.receipt_delay) = delay;
    }

    pub fn set_blocks(&self, blocks: Vec<BlockStats>) {
        *lock(&self.blocks) = blocks;
    }

    pub fn set_pending(&self, pending: u64) {
        self.pending.store(pending, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    pub fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn fetch_pool(&self, pool_id: &PoolId) -> Result<PoolWrapper, ChainError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("fetch failed".to_string()));
        }
        lock(&self.pools).get(pool_id).cloned().ok_or_else(|| ChainError::NotFound(pool_id.to_string()))
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        lock(&self.gas_price).ok_or_else(|| ChainError::Rpc("gas price unavailable".to_string()))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, ChainError> {
        lock(&self.gas_estimate).ok_or_else(|| ChainError::Rpc("estimate failed".to_string()))
    }

    async fn simulate(&self, _tx: &TxRequest) -> Result<Bytes, ChainError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.simulate_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.simulate_revert).clone() {
            Some(data) => Err(ChainError::Reverted { data }),
            None => Ok(Bytes::new()),
        }
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        if self.send_fails.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("nonce too low".to_string()));
        }
        let mut sent = lock(&self.sent);
        sent.push(tx.clone());
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.receipt_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let block_number = self.block_number.load(Ordering::SeqCst) + 1;
        let receipt = match lock(&self.receipt).clone() {
            ReceiptBehaviour::Success => {
                Some(TxReceipt { tx_hash, success: true, gas_used: 310_000, block_number, revert_data: None })
            }
            ReceiptBehaviour::Revert(data) => {
                Some(TxReceipt { tx_hash, success: false, gas_used: 120_000, block_number, revert_data: Some(data) })
            }
            ReceiptBehaviour::Pending => None,
        };
        Ok(receipt)
    }

    async fn recent_blocks(&self, count: usize) -> Result<Vec<BlockStats>, ChainError> {
        let blocks = lock(&self.blocks);
        let skip = blocks.len().saturating_sub(count);
        Ok(blocks[skip..].to_vec())
    }

    async fn pending_tx_count(&self) -> Result<u64, ChainError> {
        Ok(self.pending.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct MockOracle {
    prices: Mutex<HashMap<Address, U256>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, token: Address, usd_price: U256) -> Self {
        self.set_price(token, usd_price);
        self
    }

    pub fn set_price(&self, token: Address, usd_price: U256) {
        lock(&self.prices).insert(token, usd_price);
    }

    pub fn remove_price(&self, token: &Address) {
        lock(&self.prices).remove(token);
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn usd_price(&self, token: Address) -> Result<U256, ChainError> {
        lock(&self.prices).get(&token).copied().ok_or_else(|| ChainError::NotFound(format!("price for {token}")))
    }
}

pub struct MockSensor {
    value_bps: AtomicU32,
    fails: AtomicBool,
    delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
}

impl MockSensor {
    pub fn new(value_bps: u32) -> Self {
        Self { value_bps: AtomicU32::new(value_bps), fails: AtomicBool::new(false), delay: Mutex::new(None), reads: AtomicUsize::new(0) }
    }

    pub fn set_fails(&self, fails: bool) {
        self.fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RiskSensor for MockSensor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn read(&self) -> eyre::Result<SensorReading> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails.load(Ordering::SeqCst) {
            return Err(eyre!("sensor offline"));
        }
        Ok(SensorReading::now(self.value_bps.load(Ordering::SeqCst)))
    }
}
