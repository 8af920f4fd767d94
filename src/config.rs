use crate::logic::gas::GasConfig;
use crate::logic::mev_risk::MevRiskParams;
use crate::logic::profit_calculator::ProfitConfig;
use crate::logic::slippage::SlippageConfig;
use crate::logic::types::{FlashLoanConfig, FlashLoanProvider};
use crate::utils::config_loader::{ConfigLoader, ConfigLoaderSync, LoadConfigError, load_from_file, load_from_file_sync};
use crate::utils::constants::{BPS, MAX_TOKEN_DECIMALS, WETH};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A token cycles start and end at, with the amount probed through each path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTokenConfig {
    pub address: Address,
    pub symbol: Option<String>,
    pub decimals: u8,
    pub probe_amount: U256,
    /// Overrides `profit.default_min_profit` for this token.
    pub min_profit: Option<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chain_id: u64,
    /// Wrapped native token, used to price gas.
    pub native_token: Address,
    pub start_tokens: Vec<StartTokenConfig>,
    pub pools: Vec<Address>,
    pub max_hops: usize,
    pub max_paths: usize,
    pub tick_interval_ms: u64,
    pub parallel_evaluation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            native_token: WETH,
            start_tokens: vec![StartTokenConfig {
                address: WETH,
                symbol: Some("WETH".to_string()),
                decimals: 18,
                probe_amount: U256::from(1_000_000_000_000_000_000u64),
                min_profit: None,
            }],
            pools: Vec::new(),
            max_hops: 4,
            max_paths: 10_000,
            tick_interval_ms: 12_000,
            parallel_evaluation: true,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub contract: Address,
    pub signer: Address,
    pub use_flash_loan: bool,
    pub flash_loan_provider: FlashLoanProvider,
    pub flash_loan_fee_bps: u32,
    pub simulate_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    /// No receipt within this bound ends in TIMEOUT.
    pub receipt_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub signer_lock_timeout_ms: u64,
    pub deadline_secs: u64,
    /// Used when on-chain gas estimation fails.
    pub default_gas_limit: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            contract: Address::ZERO,
            signer: Address::ZERO,
            use_flash_loan: true,
            flash_loan_provider: FlashLoanProvider::AaveV3,
            flash_loan_fee_bps: 9,
            simulate_timeout_ms: 3_000,
            submit_timeout_ms: 5_000,
            receipt_timeout_ms: 60_000,
            receipt_poll_interval_ms: 1_000,
            signer_lock_timeout_ms: 500,
            deadline_secs: 120,
            default_gas_limit: 1_500_000,
        }
    }
}

impl ExecutionConfig {
    pub fn flash_loan(&self) -> Option<FlashLoanConfig> {
        self.use_flash_loan.then_some(FlashLoanConfig { provider: self.flash_loan_provider, fee_bps: self.flash_loan_fee_bps })
    }

    pub fn simulate_timeout(&self) -> Duration {
        Duration::from_millis(self.simulate_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn signer_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.signer_lock_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// One block interval by default.
    pub ttl_ms: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 12_000, fetch_timeout_ms: 2_000 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub poll_interval_ms: u64,
    pub read_timeout_ms: u64,
    /// Published for a sensor whose read fails or times out.
    pub fallback_bps: u32,
    pub congestion_window: usize,
    pub density_window: usize,
    /// Pending transactions that count as a full mempool.
    pub pending_capacity: u64,
    pub router_addresses: Vec<Address>,
    /// A sender is high gas when paying this multiple of the window average.
    pub high_gas_multiple: u64,
    /// Distinct high gas senders that count as saturated clustering.
    pub cluster_normalizer: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            read_timeout_ms: 2_000,
            fallback_bps: 5_000,
            congestion_window: 5,
            density_window: 10,
            pending_capacity: 10_000,
            router_addresses: Vec::new(),
            high_gas_multiple: 5,
            cluster_normalizer: 50,
        }
    }
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Whole service configuration. Loaded once, validated, then shared read-only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbConfig {
    pub engine: EngineConfig,
    pub profit: ProfitConfig,
    pub slippage: SlippageConfig,
    pub gas: GasConfig,
    pub mev: MevRiskParams,
    pub execution: ExecutionConfig,
    pub cache: CacheConfig,
    pub sensors: SensorConfig,
}

fn config_error(message: impl Into<String>) -> LoadConfigError {
    LoadConfigError::ConfigError(message.into())
}

impl ArbConfig {
    pub fn validate(&self) -> Result<(), LoadConfigError> {
        let engine = &self.engine;
        if engine.max_hops < 2 {
            return Err(config_error(format!("engine.max_hops must be at least 2, got {}", engine.max_hops)));
        }
        if engine.max_paths == 0 {
            return Err(config_error("engine.max_paths must be positive"));
        }
        if engine.tick_interval_ms == 0 {
            return Err(config_error("engine.tick_interval_ms must be positive"));
        }
        if engine.start_tokens.is_empty() {
            return Err(config_error("engine.start_tokens is empty"));
        }
        for token in &engine.start_tokens {
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(config_error(format!("start token {} has {} decimals", token.address, token.decimals)));
            }
            if token.probe_amount.is_zero() {
                return Err(config_error(format!("start token {} has a zero probe amount", token.address)));
            }
        }

        if self.slippage.max_bps > BPS || self.slippage.default_tolerance_bps > BPS {
            return Err(config_error("slippage bounds exceed 10000 bps"));
        }
        if self.gas.buffer_bps < BPS {
            return Err(config_error(format!("gas.buffer_bps = {} would shrink estimates", self.gas.buffer_bps)));
        }
        if self.gas.table_for(engine.chain_id).is_none() {
            return Err(config_error(format!("no gas table for chain {}", engine.chain_id)));
        }
        self.mev.validate().map_err(config_error)?;

        let execution = &self.execution;
        if execution.flash_loan_fee_bps >= BPS {
            return Err(config_error("execution.flash_loan_fee_bps must be below 10000"));
        }
        if execution.receipt_poll_interval_ms == 0 || execution.receipt_timeout_ms < execution.receipt_poll_interval_ms {
            return Err(config_error("execution.receipt_timeout_ms must cover at least one poll interval"));
        }
        if execution.default_gas_limit == 0 {
            return Err(config_error("execution.default_gas_limit must be positive"));
        }
        if self.cache.ttl_ms == 0 || self.cache.fetch_timeout_ms == 0 {
            return Err(config_error("cache.ttl_ms and cache.fetch_timeout_ms must be positive"));
        }
        if self.sensors.poll_interval_ms == 0 || self.sensors.read_timeout_ms == 0 {
            return Err(config_error("sensors.poll_interval_ms and sensors.read_timeout_ms must be positive"));
        }
        if self.sensors.fallback_bps > BPS {
            return Err(config_error("sensors.fallback_bps exceeds 10000"));
        }
        if self.sensors.congestion_window < 2 || self.sensors.density_window == 0 {
            return Err(config_error("sensor windows are too small"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigLoader for ArbConfig {
    type SectionType = ArbConfig;

    async fn load_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let config: ArbConfig = load_from_file(file_name).await?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigLoaderSync for ArbConfig {
    type SectionType = ArbConfig;

    fn load_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let config: ArbConfig = load_from_file_sync(file_name)?;
        config.validate()?;
        Ok(config)
    }
}
