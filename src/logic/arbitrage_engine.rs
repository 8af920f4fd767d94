use super::gas::GasQuote;
use super::graph::TokenGraph;
use super::pathfinder::{Pathfinder, rank};
use super::pools::PoolId;
use super::profit_calculator::ProfitabilityEngine;
use super::types::{ArbitragePath, MarketState, ProfitabilityResult};
use crate::chain::{ChainClient, PriceOracle};
use crate::config::ArbConfig;
use crate::data_sync::{PoolDataCache, RiskSnapshot};
use crate::utils::Token;
use eyre::{Result, eyre};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-tick orchestration of the logic layer.
///
/// Every cycle rebuilds the token graph from whatever the pool cache returns, prices gas
/// from fresh chain and oracle reads, and evaluates each configured start token. Reads that
/// fail or time out never block the cycle: gas price falls back to configuration, pools and
/// start tokens without data are left out.
pub struct ArbitrageEngine {
    config: Arc<ArbConfig>,
    client: Arc<dyn ChainClient>,
    oracle: Arc<dyn PriceOracle>,
    cache: Arc<PoolDataCache>,
    risk: watch::Receiver<Arc<RiskSnapshot>>,
    profitability: ProfitabilityEngine,
    pool_ids: Vec<PoolId>,
    tokens: Vec<Arc<Token>>,
    read_timeout: Duration,
    cycles: AtomicU64,
    last_cycle_paths: AtomicU64,
    last_cycle_accepted: AtomicU64,
}

impl ArbitrageEngine {
    pub fn config(&self) -> &Arc<ArbConfig> {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<PoolDataCache> {
        &self.cache
    }

    pub fn profitability(&self) -> &ProfitabilityEngine {
        &self.profitability
    }

    /// One full evaluation: every candidate path of every start token with its result,
    /// accepted paths first, then by net profit.
    pub async fn evaluate_cycle(&self) -> Vec<(ArbitragePath, ProfitabilityResult)> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let engine = &self.config.engine;

        let pools = self.cache.get_many(&self.pool_ids).await;
        if pools.is_empty() {
            warn!(cycle, "no pool data available, skipping cycle");
            self.record_cycle(0, 0);
            return Vec::new();
        }
        let pool_count = pools.len();

        let mut graph = match TokenGraph::from_pools(pools, &self.tokens) {
            Ok(graph) => graph,
            Err(e) => {
                warn!(cycle, error = %e, "failed to build token graph");
                self.record_cycle(0, 0);
                return Vec::new();
            }
        };
        let deactivated = graph.deactivate_unusable_pools();
        if deactivated > 0 {
            debug!(cycle, deactivated, "pools without liquidity deactivated");
        }

        let risk = self.risk.borrow().clone();
        let gas_price_wei = self.gas_price().await;
        let block_number = match timeout(self.read_timeout, self.client.block_number()).await {
            Ok(Ok(block_number)) => block_number,
            _ => 0,
        };
        let native_usd_price = match timeout(self.read_timeout, self.oracle.usd_price(engine.native_token)).await {
            Ok(Ok(price)) if !price.is_zero() => price,
            _ => {
                warn!(cycle, native_token = %engine.native_token, "native token price unavailable, skipping cycle");
                self.record_cycle(0, 0);
                return Vec::new();
            }
        };

        let flash_loan = self.config.execution.flash_loan();
        let mut results = Vec::new();
        for start in &engine.start_tokens {
            let token_usd_price = match timeout(self.read_timeout, self.oracle.usd_price(start.address)).await {
                Ok(Ok(price)) => price,
                Ok(Err(e)) => {
                    warn!(token = %start.address, error = %e, "start token price unavailable, skipping token");
                    continue;
                }
                Err(_) => {
                    warn!(token = %start.address, "start token price timed out, skipping token");
                    continue;
                }
            };
            let gas = GasQuote { gas_price_wei, native_usd_price, token_usd_price, token_decimals: start.decimals };

            let pathfinder = Pathfinder::new(engine.max_paths).with_gas_quote(gas);
            let min_profit = self.profitability.min_profit_for(&start.address);
            let paths = match pathfinder.find_paths(&graph, start.address, start.probe_amount, engine.max_hops, min_profit) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(token = %start.address, error = %e, "path search failed");
                    continue;
                }
            };
            let paths = match flash_loan {
                Some(flash_loan) => paths.into_iter().map(|path| path.with_flash_loan(flash_loan)).collect(),
                None => paths,
            };

            let market = MarketState { chain_id: engine.chain_id, block_number, gas, risk: Arc::clone(&risk) };
            results.extend(self.profitability.evaluate_batch(paths, &market));
        }

        results.sort_by(|(a_path, a_result), (b_path, b_result)| {
            b_result.meets_profit_requirements.cmp(&a_result.meets_profit_requirements).then_with(|| rank(a_path, b_path))
        });

        let accepted = results.iter().filter(|(_, result)| result.meets_profit_requirements).count();
        self.record_cycle(results.len(), accepted);
        info!(
            cycle,
            block_number,
            pools = pool_count,
            candidates = results.len(),
            accepted,
            risk_bps = risk.composite_bps,
            degraded = risk.degraded,
            "evaluation cycle finished"
        );
        if let Some((best, result)) = results.first().filter(|(_, result)| result.meets_profit_requirements) {
            debug!(%best, roi_bps = result.roi_bps, "best opportunity");
        }
        results
    }

    async fn gas_price(&self) -> u128 {
        match timeout(self.read_timeout, self.client.gas_price()).await {
            Ok(Ok(gas_price)) => gas_price,
            Ok(Err(e)) => {
                warn!(error = %e, fallback = self.config.gas.fallback_gas_price_wei, "gas price unavailable, using fallback");
                self.config.gas.fallback_gas_price_wei
            }
            Err(_) => {
                warn!(fallback = self.config.gas.fallback_gas_price_wei, "gas price read timed out, using fallback");
                self.config.gas.fallback_gas_price_wei
            }
        }
    }

    fn record_cycle(&self, paths: usize, accepted: usize) {
        self.last_cycle_paths.store(paths as u64, Ordering::Relaxed);
        self.last_cycle_accepted.store(accepted as u64, Ordering::Relaxed);
    }

    pub fn get_statistics(&self) -> ArbitrageEngineStats {
        ArbitrageEngineStats {
            pools_tracked: self.pool_ids.len(),
            start_tokens: self.config.engine.start_tokens.len(),
            max_hops: self.config.engine.max_hops,
            parallel_evaluation: self.config.engine.parallel_evaluation,
            cycles: self.cycles.load(Ordering::Relaxed),
            last_cycle_paths: self.last_cycle_paths.load(Ordering::Relaxed),
            last_cycle_accepted: self.last_cycle_accepted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrageEngineStats {
    pub pools_tracked: usize,
    pub start_tokens: usize,
    pub max_hops: usize,
    pub parallel_evaluation: bool,
    pub cycles: u64,
    pub last_cycle_paths: u64,
    pub last_cycle_accepted: u64,
}

/// Builder pattern for creating and configuring an ArbitrageEngine
pub struct ArbitrageEngineBuilder {
    config: ArbConfig,
    client: Option<Arc<dyn ChainClient>>,
    oracle: Option<Arc<dyn PriceOracle>>,
    cache: Option<Arc<PoolDataCache>>,
    risk: Option<watch::Receiver<Arc<RiskSnapshot>>>,
}

impl ArbitrageEngineBuilder {
    pub fn new() -> Self {
        Self { config: ArbConfig::default(), client: None, oracle: None, cache: None, risk: None }
    }

    pub fn with_config(mut self, config: ArbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Shares an existing cache, e.g. with the execution coordinator.
    pub fn with_cache(mut self, cache: Arc<PoolDataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_risk_feed(mut self, risk: watch::Receiver<Arc<RiskSnapshot>>) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.config.engine.max_hops = max_hops;
        self
    }

    pub fn with_parallel_evaluation(mut self, enabled: bool) -> Self {
        self.config.engine.parallel_evaluation = enabled;
        self
    }

    pub fn build(self) -> Result<ArbitrageEngine> {
        self.config.validate()?;
        let client = self.client.ok_or_else(|| eyre!("ArbitrageEngine requires a chain client"))?;
        let oracle = self.oracle.ok_or_else(|| eyre!("ArbitrageEngine requires a price oracle"))?;
        let config = Arc::new(self.config);

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(PoolDataCache::new(Arc::clone(&client), config.cache.ttl(), config.cache.fetch_timeout())));
        let risk = self.risk.unwrap_or_else(|| {
            warn!("no risk feed configured, evaluating against the fallback risk snapshot");
            watch::channel(Arc::new(RiskSnapshot::fallback(config.sensors.fallback_bps))).1
        });

        let mut profitability =
            ProfitabilityEngine::new(config.profit.clone(), config.slippage.clone(), config.gas.clone(), config.mev.clone())
                .with_parallel(config.engine.parallel_evaluation);
        let mut tokens = vec![Arc::new(Token::new(config.engine.native_token))];
        for start in &config.engine.start_tokens {
            if let Some(min_profit) = start.min_profit {
                profitability = profitability.with_token_minimum(start.address, min_profit);
            }
            tokens.push(Arc::new(Token::new_with_data(start.address, start.symbol.clone(), start.decimals)?));
        }
        let pool_ids = config.engine.pools.iter().copied().map(PoolId::from).collect::<Vec<_>>();

        info!(
            pools = pool_ids.len(),
            start_tokens = config.engine.start_tokens.len(),
            max_hops = config.engine.max_hops,
            flash_loan = config.execution.use_flash_loan,
            "arbitrage engine initialised"
        );

        Ok(ArbitrageEngine {
            read_timeout: config.cache.fetch_timeout(),
            config,
            client,
            oracle,
            cache,
            risk,
            profitability,
            pool_ids,
            tokens,
            cycles: AtomicU64::new(0),
            last_cycle_paths: AtomicU64::new(0),
            last_cycle_accepted: AtomicU64::new(0),
        })
    }
}

impl Default for ArbitrageEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
