use super::sensors::{RiskSensor, SensorReading};
use crate::config::SensorConfig;
use crate::utils::constants::BPS;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Latest adversarial signals. Replaced wholesale on every poll, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub congestion: SensorReading,
    pub searcher_density: SensorReading,
    /// `density * (1 - congestion / 2)`
    pub composite_bps: u32,
    /// At least one reading is the configured fallback.
    pub degraded: bool,
}

impl RiskSnapshot {
    pub fn new(congestion: SensorReading, searcher_density: SensorReading, degraded: bool) -> Self {
        let congestion_bps = congestion.value_bps.min(BPS) as u64;
        let composite = searcher_density.value_bps.min(BPS) as u64 * (BPS as u64 - congestion_bps / 2) / BPS as u64;
        Self { congestion, searcher_density, composite_bps: composite as u32, degraded }
    }

    pub fn from_bps(congestion_bps: u32, searcher_density_bps: u32, degraded: bool) -> Self {
        Self::new(SensorReading::now(congestion_bps), SensorReading::now(searcher_density_bps), degraded)
    }

    pub fn fallback(fallback_bps: u32) -> Self {
        Self::from_bps(fallback_bps, fallback_bps, true)
    }
}

struct HubInner {
    congestion: Arc<dyn RiskSensor>,
    searcher_density: Arc<dyn RiskSensor>,
    read_timeout: Duration,
    fallback_bps: u32,
    snapshot_tx: watch::Sender<Arc<RiskSnapshot>>,
}

impl HubInner {
    async fn read_sensor(&self, sensor: &dyn RiskSensor) -> (SensorReading, bool) {
        match tokio::time::timeout(self.read_timeout, sensor.read()).await {
            Ok(Ok(reading)) => (reading, false),
            Ok(Err(e)) => {
                warn!(sensor = sensor.name(), error = %e, "sensor read failed, using fallback");
                (SensorReading::now(self.fallback_bps), true)
            }
            Err(_) => {
                warn!(sensor = sensor.name(), timeout = ?self.read_timeout, "sensor read timed out, using fallback");
                (SensorReading::now(self.fallback_bps), true)
            }
        }
    }

    async fn poll(&self) -> Arc<RiskSnapshot> {
        let ((congestion, congestion_degraded), (density, density_degraded)) =
            tokio::join!(self.read_sensor(self.congestion.as_ref()), self.read_sensor(self.searcher_density.as_ref()));
        let snapshot = Arc::new(RiskSnapshot::new(congestion, density, congestion_degraded || density_degraded));
        debug!(
            congestion = snapshot.congestion.value_bps,
            density = snapshot.searcher_density.value_bps,
            composite = snapshot.composite_bps,
            degraded = snapshot.degraded,
            "risk snapshot published"
        );
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

/// Polls the risk sensors on its own timer and publishes the result over a single-slot channel.
///
/// Readers never wait on I/O: they get whatever snapshot was published last. Until the first
/// poll completes that is the degraded fallback.
pub struct RiskSensorHub {
    inner: Arc<HubInner>,
    poll_interval: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RiskSensorHub {
    pub fn new(congestion: Arc<dyn RiskSensor>, searcher_density: Arc<dyn RiskSensor>, config: &SensorConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(RiskSnapshot::fallback(config.fallback_bps)));
        Self {
            inner: Arc::new(HubInner {
                congestion,
                searcher_density,
                read_timeout: config.read_timeout(),
                fallback_bps: config.fallback_bps,
                snapshot_tx,
            }),
            poll_interval: config.poll_interval(),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Latest snapshot. No I/O.
    pub fn get_risk_params(&self) -> Arc<RiskSnapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RiskSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Reads both sensors once and publishes the result.
    pub async fn poll_once(&self) -> Arc<RiskSnapshot> {
        self.inner.poll().await
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn start(&mut self) -> eyre::Result<()> {
        if self.task.is_some() {
            return Err(eyre!("RiskSensorHub already started"));
        }
        if self.poll_interval.is_zero() {
            return Err(eyre!("RiskSensorHub poll interval must be positive"));
        }
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let inner = Arc::clone(&self.inner);
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            info!(?poll_interval, "risk sensor polling started");
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        inner.poll().await;
                    }
                }
            }
            info!("risk sensor polling stopped");
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    pub async fn stop(&mut self) -> eyre::Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sensor task error during shutdown: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSensor;

    fn hub(congestion: &Arc<MockSensor>, density: &Arc<MockSensor>) -> RiskSensorHub {
        let config = SensorConfig { poll_interval_ms: 10, read_timeout_ms: 50, ..SensorConfig::default() };
        RiskSensorHub::new(congestion.clone(), density.clone(), &config)
    }

    #[test]
    fn test_composite_formula() {
        assert_eq!(RiskSnapshot::from_bps(4_000, 3_000, false).composite_bps, 2_400);
        assert_eq!(RiskSnapshot::from_bps(0, 3_000, false).composite_bps, 3_000);
        assert_eq!(RiskSnapshot::from_bps(10_000, 10_000, false).composite_bps, 5_000);
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_degraded_fallback() -> eyre::Result<()> {
        let hub = hub(&Arc::new(MockSensor::new(1_000)), &Arc::new(MockSensor::new(2_000)));
        let snapshot = hub.get_risk_params();
        assert!(snapshot.degraded);
        assert_eq!(snapshot.congestion.value_bps, 5_000);
        assert_eq!(snapshot.searcher_density.value_bps, 5_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_publishes_readings() -> eyre::Result<()> {
        let hub = hub(&Arc::new(MockSensor::new(4_000)), &Arc::new(MockSensor::new(3_000)));
        let mut receiver = hub.subscribe();

        let snapshot = hub.poll_once().await;
        assert!(!snapshot.degraded);
        assert_eq!(snapshot.composite_bps, 2_400);
        assert!(receiver.has_changed()?);
        assert_eq!(*receiver.borrow_and_update(), snapshot);
        assert_eq!(hub.get_risk_params(), snapshot);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_or_slow_sensor_falls_back() -> eyre::Result<()> {
        let congestion = Arc::new(MockSensor::new(4_000));
        let density = Arc::new(MockSensor::new(3_000));
        let hub = hub(&congestion, &density);

        congestion.set_fails(true);
        let snapshot = hub.poll_once().await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.congestion.value_bps, 5_000);
        assert_eq!(snapshot.searcher_density.value_bps, 3_000);

        congestion.set_fails(false);
        density.set_delay(Some(Duration::from_millis(200)));
        let snapshot = hub.poll_once().await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.congestion.value_bps, 4_000);
        assert_eq!(snapshot.searcher_density.value_bps, 5_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_and_stop() -> eyre::Result<()> {
        let congestion = Arc::new(MockSensor::new(4_000));
        let density = Arc::new(MockSensor::new(3_000));
        let mut hub = hub(&congestion, &density);

        hub.start()?;
        assert!(hub.start().is_err());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(hub.is_running());
        assert!(!hub.get_risk_params().degraded);

        hub.stop().await?;
        assert!(!hub.is_running());
        let reads = congestion.reads();
        assert!(reads > 0);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(congestion.reads(), reads);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_poll_interval_refuses_to_start() -> eyre::Result<()> {
        let config = SensorConfig { poll_interval_ms: 0, ..SensorConfig::default() };
        let mut hub = RiskSensorHub::new(Arc::new(MockSensor::new(4_000)), Arc::new(MockSensor::new(3_000)), &config);

        assert!(hub.start().is_err());
        assert!(!hub.is_running());
        hub.stop().await?;
        Ok(())
    }
}
