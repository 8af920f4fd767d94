/// Logic Layer
///
/// Pricing, path search and profitability. Everything here is pure computation over
/// snapshots handed in by the data layer, except the engine, which gathers those snapshots
/// once per tick.
pub mod arbitrage_engine;
pub mod gas;
pub mod graph;
pub mod math;
pub mod mev_risk;
pub mod pathfinder;
pub mod pools;
pub mod profit_calculator;
pub mod slippage;
pub mod types;

pub use arbitrage_engine::{ArbitrageEngine, ArbitrageEngineBuilder, ArbitrageEngineStats};
pub use gas::{ExecutionType, GasConfig, GasQuote, GasTable};
pub use graph::{PathHash, TokenGraph};
pub use mev_risk::{MevRiskParams, TransactionType};
pub use pathfinder::Pathfinder;
pub use pools::{CalculationError, ConcentratedLiquidityPool, ConstantProductPool, DexKind, Pool, PoolClass, PoolId, PoolWrapper, StableSwapPool};
pub use profit_calculator::{ProfitConfig, ProfitabilityEngine};
pub use slippage::SlippageConfig;
pub use types::{ArbitrageHop, ArbitragePath, FlashLoanConfig, FlashLoanProvider, MarketState, ProfitabilityResult, RejectionReason};
