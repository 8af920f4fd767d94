use crate::chain::{ChainClient, PriceOracle};
use crate::config::ArbConfig;
use crate::data_sync::{MempoolCongestionSensor, PoolDataCache, RiskSensorHub, SearcherDensitySensor};
use crate::execution::{ExecutionState, FlashLoanCoordinator};
use crate::logic::types::{ArbitragePath, ProfitabilityResult};
use crate::logic::{ArbitrageEngine, ArbitrageEngineBuilder};
use eyre::{Result, eyre};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct ServiceStats {
    pub ticks: AtomicU64,
    pub opportunities: AtomicU64,
    pub executions: AtomicU64,
    pub confirmed: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub ticks: u64,
    pub opportunities: u64,
    pub executions: u64,
    pub confirmed: u64,
}

impl ServiceStats {
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            opportunities: self.opportunities.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
        }
    }
}

/// The tick loop: one evaluation cycle per tick, the best accepted path handed to the
/// coordinator.
///
/// Shutdown is only observed between cycles and while evaluating. An execution that has
/// begun always runs to a terminal state first.
pub struct ArbitrageService {
    engine: Arc<ArbitrageEngine>,
    coordinator: Arc<FlashLoanCoordinator>,
    sensor_hub: Option<RiskSensorHub>,
    stats: Arc<ServiceStats>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ArbitrageService {
    pub fn new(engine: ArbitrageEngine, sensor_hub: Option<RiskSensorHub>) -> Self {
        let config = engine.config();
        let coordinator = FlashLoanCoordinator::new(
            Arc::clone(engine.client()),
            Arc::clone(engine.cache()),
            config.execution.clone(),
            config.slippage.default_tolerance_bps,
            config.gas.buffer_bps,
        );
        Self {
            engine: Arc::new(engine),
            coordinator: Arc::new(coordinator),
            sensor_hub,
            stats: Arc::new(ServiceStats::default()),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Wires the sensors, the hub, one shared pool cache, the engine and the coordinator.
    pub fn from_config(config: ArbConfig, client: Arc<dyn ChainClient>, oracle: Arc<dyn PriceOracle>) -> Result<Self> {
        let congestion = Arc::new(MempoolCongestionSensor::new(Arc::clone(&client), &config.sensors));
        let density = Arc::new(SearcherDensitySensor::new(Arc::clone(&client), &config.sensors));
        let sensor_hub = RiskSensorHub::new(congestion, density, &config.sensors);
        let cache = Arc::new(PoolDataCache::new(Arc::clone(&client), config.cache.ttl(), config.cache.fetch_timeout()));

        let engine = ArbitrageEngineBuilder::new()
            .with_config(config)
            .with_client(client)
            .with_oracle(oracle)
            .with_cache(cache)
            .with_risk_feed(sensor_hub.subscribe())
            .build()?;
        Ok(Self::new(engine, Some(sensor_hub)))
    }

    pub fn engine(&self) -> &Arc<ArbitrageEngine> {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<FlashLoanCoordinator> {
        &self.coordinator
    }

    pub fn get_stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// One evaluation cycle and, when something clears every threshold, one execution.
    pub async fn tick_once(&self) -> Option<ExecutionState> {
        let results = self.engine.evaluate_cycle().await;
        run_execution(&self.coordinator, &self.stats, results).await
    }

    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(eyre!("ArbitrageService already started"));
        }
        if let Some(sensor_hub) = self.sensor_hub.as_mut() {
            sensor_hub.start()?;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let engine = Arc::clone(&self.engine);
        let coordinator = Arc::clone(&self.coordinator);
        let stats = Arc::clone(&self.stats);
        let tick_interval = engine.config().engine.tick_interval();

        let task = tokio::spawn(async move {
            info!(?tick_interval, "arbitrage service started");
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {}
                }
                let results = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    results = engine.evaluate_cycle() => results,
                };
                run_execution(&coordinator, &stats, results).await;
            }
            info!("arbitrage service stopped");
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Service task error during shutdown: {}", e);
            }
        }
        if let Some(sensor_hub) = self.sensor_hub.as_mut() {
            sensor_hub.stop().await?;
        }
        Ok(())
    }
}

impl Drop for ArbitrageService {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ArbitrageService dropped while running, tasks may be orphaned");
        }
    }
}

async fn run_execution(
    coordinator: &FlashLoanCoordinator,
    stats: &ServiceStats,
    results: Vec<(ArbitragePath, ProfitabilityResult)>,
) -> Option<ExecutionState> {
    stats.ticks.fetch_add(1, Ordering::Relaxed);
    let accepted = results.iter().filter(|(_, result)| result.meets_profit_requirements).count();
    stats.opportunities.fetch_add(accepted as u64, Ordering::Relaxed);

    let (best, result) = results.into_iter().find(|(_, result)| result.meets_profit_requirements)?;
    if best.flash_loan.is_none() {
        debug!(path = %best, net_profit = %result.net_profit, "flash loans disabled, not executing");
        return None;
    }

    stats.executions.fetch_add(1, Ordering::Relaxed);
    info!(path = %best, net_profit = %result.net_profit, roi_bps = result.roi_bps, "executing best opportunity");
    match coordinator.execute_path(&best).await {
        Ok(state) => {
            if matches!(state, ExecutionState::Confirmed { .. }) {
                stats.confirmed.fetch_add(1, Ordering::Relaxed);
            }
            Some(state)
        }
        Err(e) => {
            error!(path = %best, error = %e, "execution failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartTokenConfig;
    use crate::data_sync::RiskSnapshot;
    use crate::test_utils::{MockChainClient, MockOracle, e18, sample_pools};
    use crate::utils::constants::{USD_SCALE, WETH};
    use alloy_primitives::{Address, U256};
    use std::time::Duration;
    use tokio::sync::watch;

    fn config() -> ArbConfig {
        let mut config = ArbConfig::default();
        config.engine.pools = sample_pools().iter().map(|pool| pool.get_address()).collect();
        config.engine.start_tokens =
            vec![StartTokenConfig { address: WETH, symbol: None, decimals: 18, probe_amount: e18(10), min_profit: None }];
        config.engine.tick_interval_ms = 10;
        config.execution.contract = Address::repeat_byte(0xc0);
        config.execution.signer = Address::repeat_byte(0x5e);
        config.execution.receipt_timeout_ms = 200;
        config.execution.receipt_poll_interval_ms = 10;
        config.sensors.poll_interval_ms = 10;
        config.sensors.read_timeout_ms = 50;
        config
    }

    fn client() -> Arc<MockChainClient> {
        let client = Arc::new(MockChainClient::new());
        for pool in sample_pools() {
            client.set_pool(pool);
        }
        client
    }

    fn oracle() -> Arc<MockOracle> {
        Arc::new(MockOracle::new().with_price(WETH, U256::from(2_000u64) * USD_SCALE))
    }

    fn service(client: &Arc<MockChainClient>, config: ArbConfig) -> Result<ArbitrageService> {
        let (_, risk) = watch::channel(Arc::new(RiskSnapshot::from_bps(3_000, 2_000, false)));
        let engine = ArbitrageEngineBuilder::new()
            .with_config(config)
            .with_client(client.clone())
            .with_oracle(oracle())
            .with_risk_feed(risk)
            .build()?;
        Ok(ArbitrageService::new(engine, None))
    }

    #[tokio::test]
    async fn test_tick_executes_best_path() -> Result<()> {
        let client = client();
        let service = service(&client, config())?;

        let state = service.tick_once().await.ok_or_else(|| eyre!("nothing executed"))?;
        assert!(matches!(state, ExecutionState::Confirmed { .. }), "{state}");
        assert_eq!(client.sent().len(), 1);
        assert_eq!(client.sent()[0].to, Address::repeat_byte(0xc0));

        let stats = service.get_stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.opportunities, 1);
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(service.coordinator().stats.snapshot().confirmed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluate_only_mode_never_submits() -> Result<()> {
        let client = client();
        let mut config = config();
        config.execution.use_flash_loan = false;
        let service = service(&client, config)?;

        assert!(service.tick_once().await.is_none());
        assert!(client.sent().is_empty());
        assert_eq!(service.get_stats().opportunities, 1);
        assert_eq!(service.get_stats().executions, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_simulation_revert_is_rejected_without_submission() -> Result<()> {
        let client = client();
        client.set_simulate_revert(Some(alloy_primitives::Bytes::from_static(b"\x00")));
        let service = service(&client, config())?;

        let state = service.tick_once().await.ok_or_else(|| eyre!("nothing executed"))?;
        assert!(matches!(state, ExecutionState::Rejected { .. }));
        assert!(client.sent().is_empty());
        assert_eq!(service.get_stats().confirmed, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_and_stop() -> Result<()> {
        let client = client();
        let mut service = service(&client, config())?;

        service.start()?;
        assert!(service.is_running());
        assert!(service.start().is_err());
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.stop().await?;

        assert!(!service.is_running());
        assert!(service.get_stats().ticks >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_waits_for_inflight_execution() -> Result<()> {
        let client = client();
        client.set_receipt_delay(Some(Duration::from_millis(150)));
        let mut config = config();
        config.execution.receipt_timeout_ms = 1_000;
        let mut service = service(&client, config)?;

        service.start()?;
        tokio::time::timeout(Duration::from_secs(2), async {
            while client.receipt_calls() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        service.stop().await?;

        assert!(!service.is_running());
        assert_eq!(client.sent().len(), 1);
        let stats = service.get_stats();
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(service.coordinator().stats.snapshot().confirmed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_from_config_runs_sensor_hub() -> Result<()> {
        let client = client();
        let mut service = ArbitrageService::from_config(config(), client.clone(), oracle())?;

        service.start()?;
        tokio::time::sleep(Duration::from_millis(60)).await;
        service.stop().await?;

        assert!(!service.is_running());
        assert!(service.get_stats().ticks >= 1);
        Ok(())
    }
}
