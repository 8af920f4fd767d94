use crate::chain::{BlockStats, ChainClient};
use crate::config::SensorConfig;
use crate::logic::math::mean_and_stdev;
use crate::utils::constants::BPS;
use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp_ms: u64,
    pub value_bps: u32,
}

impl SensorReading {
    pub fn now(value_bps: u32) -> Self {
        Self { timestamp_ms: now_ms(), value_bps: value_bps.min(BPS) }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

#[async_trait]
pub trait RiskSensor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read(&self) -> eyre::Result<SensorReading>;
}

fn weighted(components: &[(u32, u32)]) -> u32 {
    let total: u64 = components.iter().map(|(weight, value)| *weight as u64 * (*value).min(BPS) as u64).sum();
    (total / 100).min(BPS as u64) as u32
}

fn ratio(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return BPS;
    }
    (numerator as u128 * BPS as u128 / denominator as u128).min(BPS as u128) as u32
}

/// Mempool pressure from pending transactions, block fullness swings and base fee velocity.
pub fn congestion_bps(pending: u64, pending_capacity: u64, blocks: &[BlockStats]) -> u32 {
    let pending_ratio = ratio(pending, pending_capacity);

    let utilisation: Vec<u64> =
        blocks.iter().filter(|b| b.gas_limit > 0).map(|b| ratio(b.gas_used, b.gas_limit) as u64).collect();
    let (_, usage_stdev) = mean_and_stdev(&utilisation);
    let usage_deviation = usage_stdev.saturating_mul(2).min(BPS as u64) as u32;

    let fee_velocity = base_fee_velocity_bps(blocks);

    weighted(&[(40, pending_ratio), (30, usage_deviation), (30, fee_velocity)])
}

/// Base fee change across the whole window relative to the oldest block, saturating at 100%.
/// An empty oldest base fee counts as saturated unless the newest is empty too.
pub fn base_fee_velocity_bps(blocks: &[BlockStats]) -> u32 {
    let (Some(oldest), Some(newest)) = (blocks.first(), blocks.last()) else {
        return 0;
    };
    if blocks.len() < 2 {
        return 0;
    }
    if oldest.base_fee == 0 {
        return if newest.base_fee == 0 { 0 } else { BPS };
    }
    (newest.base_fee.abs_diff(oldest.base_fee).saturating_mul(BPS as u128) / oldest.base_fee).min(BPS as u128) as u32
}

/// Competing searcher activity from router traffic, gas price dispersion and high gas sender clustering.
pub fn searcher_density_bps(blocks: &[BlockStats], routers: &HashSet<Address>, high_gas_multiple: u64, cluster_normalizer: u64) -> u32 {
    let txs: Vec<_> = blocks.iter().flat_map(|b| b.transactions.iter()).collect();
    if txs.is_empty() {
        return 0;
    }

    let router_txs = txs.iter().filter(|tx| tx.to.is_some_and(|to| routers.contains(&to))).count() as u64;
    let router_ratio = ratio(router_txs, txs.len() as u64);

    let gas_prices: Vec<u64> = txs.iter().map(|tx| u64::try_from(tx.gas_price).unwrap_or(u64::MAX)).collect();
    let (mean_price, stdev_price) = mean_and_stdev(&gas_prices);
    let dispersion = if mean_price == 0 { 0 } else { ratio(stdev_price, mean_price) };

    let threshold = mean_price.saturating_mul(high_gas_multiple.max(1));
    let high_gas_senders: HashSet<Address> =
        txs.iter().filter(|tx| mean_price > 0 && u64::try_from(tx.gas_price).unwrap_or(u64::MAX) >= threshold).map(|tx| tx.from).collect();
    let clustering = ratio(high_gas_senders.len() as u64, cluster_normalizer.max(1));

    weighted(&[(40, router_ratio), (40, dispersion), (20, clustering)])
}

pub struct MempoolCongestionSensor {
    client: Arc<dyn ChainClient>,
    window: usize,
    pending_capacity: u64,
}

impl MempoolCongestionSensor {
    pub fn new(client: Arc<dyn ChainClient>, config: &SensorConfig) -> Self {
        Self { client, window: config.congestion_window, pending_capacity: config.pending_capacity }
    }
}

#[async_trait]
impl RiskSensor for MempoolCongestionSensor {
    fn name(&self) -> &'static str {
        "mempool_congestion"
    }

    async fn read(&self) -> eyre::Result<SensorReading> {
        let pending = self.client.pending_tx_count().await?;
        let blocks = self.client.recent_blocks(self.window).await?;
        if blocks.is_empty() {
            return Err(eyre!("no recent blocks"));
        }
        Ok(SensorReading::now(congestion_bps(pending, self.pending_capacity, &blocks)))
    }
}

pub struct SearcherDensitySensor {
    client: Arc<dyn ChainClient>,
    window: usize,
    routers: HashSet<Address>,
    high_gas_multiple: u64,
    cluster_normalizer: u64,
}

impl SearcherDensitySensor {
    pub fn new(client: Arc<dyn ChainClient>, config: &SensorConfig) -> Self {
        Self {
            client,
            window: config.density_window,
            routers: config.router_addresses.iter().copied().collect(),
            high_gas_multiple: config.high_gas_multiple,
            cluster_normalizer: config.cluster_normalizer,
        }
    }
}

#[async_trait]
impl RiskSensor for SearcherDensitySensor {
    fn name(&self) -> &'static str {
        "searcher_density"
    }

    async fn read(&self) -> eyre::Result<SensorReading> {
        let blocks = self.client.recent_blocks(self.window).await?;
        if blocks.is_empty() {
            return Err(eyre!("no recent blocks"));
        }
        Ok(SensorReading::now(searcher_density_bps(&blocks, &self.routers, self.high_gas_multiple, self.cluster_normalizer)))
    }
}
