use crate::errors::ChainError;
use crate::logic::pools::{PoolId, PoolWrapper};
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

/// An unsigned call to the arbitrage contract. Signing and nonce handling belong to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub block_number: u64,
    /// Revert data when the client can recover it.
    pub revert_data: Option<Bytes>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTx {
    pub from: Address,
    pub to: Option<Address>,
    pub gas_price: u128,
}

/// What the risk sensors need to know about a mined block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub number: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee: u128,
    pub transactions: Vec<BlockTx>,
}

/// Chain access. Every call may be slow or fail, callers put their own timeouts around it.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn fetch_pool(&self, pool_id: &PoolId) -> Result<PoolWrapper, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ChainError>;

    /// Dry run of `tx` against the latest state. A revert is `ChainError::Reverted`.
    async fn simulate(&self, tx: &TxRequest) -> Result<Bytes, ChainError>;

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError>;

    /// `None` while the transaction is pending.
    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError>;

    /// Most recent `count` blocks, newest last.
    async fn recent_blocks(&self, count: usize) -> Result<Vec<BlockStats>, ChainError>;

    async fn pending_tx_count(&self) -> Result<u64, ChainError>;
}

/// Token prices in USD with 18 decimals. Only used to normalise gas and risk.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn usd_price(&self, token: Address) -> Result<U256, ChainError>;
}
