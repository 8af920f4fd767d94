pub mod pool_cache;
pub mod sensor_hub;
pub mod sensors;

pub use pool_cache::{CacheStatsSnapshot, PoolDataCache};
pub use sensor_hub::{RiskSensorHub, RiskSnapshot};
pub use sensors::{MempoolCongestionSensor, RiskSensor, SearcherDensitySensor, SensorReading};
