// Three-Layer Architecture
pub mod data_sync; // Data Layer: pool cache, risk sensors
pub mod execution; // Execution Layer: flash loan parameters, transaction lifecycle
pub mod logic; // Logic Layer: pricing, path search, profitability

pub mod chain;
pub mod config;
pub mod errors;
pub mod service;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use chain::{BlockStats, BlockTx, ChainClient, PriceOracle, TxReceipt, TxRequest};
pub use config::{ArbConfig, CacheConfig, EngineConfig, ExecutionConfig, SensorConfig, StartTokenConfig};
pub use data_sync::{PoolDataCache, RiskSensorHub, RiskSnapshot, SensorReading};
pub use errors::{ArbError, ChainError};
pub use execution::{ExecutionState, FlashLoanCoordinator};
pub use logic::{
    ArbitrageEngine, ArbitrageEngineBuilder, ArbitragePath, CalculationError, Pathfinder, Pool, PoolId, PoolWrapper,
    ProfitabilityEngine, ProfitabilityResult, TokenGraph,
};
pub use service::ArbitrageService;
pub use utils::{Token, TokenWrapper};
