//! Measurement Manager
//!
//! Owns the drivers and the measurement ring. A poll pass visits every ready
//! driver in configuration order and every measurement it declares, writing
//! one slot per measurement. When the ring reaches the fill threshold the
//! cursor resets to slot 0 and the pass ends early.

use crate::factory::SensorFactory;
use crate::ports::PortResolver;
use ring_buffer::{RingBuffer, RingError, RingStats, DEFAULT_CAPACITY};
use sensor_protocol::{
    Clock, MonotonicClock, ReadStatus, RuntimeMeasurement, SensorDriver, SensorInfo,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ring of measurement slots shared by all sensors
pub type MeasurementRing = RingBuffer<RuntimeMeasurement>;

/// Metric name for failed integrity checks
const INTEGRITY_FAILURES: &str = "aqm_integrity_failures_total";

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Invalid measurement buffer: {0}")]
    Buffer(#[from] RingError),

    #[error("Invalid fill threshold: {0}%")]
    Threshold(f32),
}

/// Configuration for the measurement manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Ring buffer slots (default: 10)
    pub capacity: usize,
    /// Fill level that triggers a cursor reset, in percent (default: 90.0)
    pub threshold_percent: f32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            threshold_percent: 90.0,
        }
    }
}

/// Lifecycle of a configured sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Activation {
    /// Driver built, `begin` not yet run
    Pending,
    Ready,
    /// `begin` failed; retried on the next `begin_sensors`
    Failed(String),
    /// No driver could be built for this row
    ConstructionFailed(String),
}

/// Per-sensor counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorHealth {
    pub sensor_id: u16,
    pub activation: Activation,
    pub reads_ok: u64,
    pub integrity_failures: u64,
    pub timeouts: u64,
    pub transport_failures: u64,
    pub unsupported: u64,
}

impl SensorHealth {
    fn new(sensor_id: u16, activation: Activation) -> Self {
        Self {
            sensor_id,
            activation,
            reads_ok: 0,
            integrity_failures: 0,
            timeouts: 0,
            transport_failures: 0,
            unsupported: 0,
        }
    }

    fn count(&mut self, status: ReadStatus) {
        match status {
            ReadStatus::Verified | ReadStatus::Unverified => self.reads_ok += 1,
            ReadStatus::IntegrityFailed => self.integrity_failures += 1,
            ReadStatus::TimedOut => self.timeouts += 1,
            ReadStatus::Unsupported => self.unsupported += 1,
            ReadStatus::TransportFailed => self.transport_failures += 1,
            ReadStatus::Pending => {}
        }
    }
}

struct SensorEntry {
    info: Arc<SensorInfo>,
    driver: Option<SensorDriver>,
    health: SensorHealth,
}

impl SensorEntry {
    fn is_ready(&self) -> bool {
        self.driver.is_some() && self.health.activation == Activation::Ready
    }
}

/// Polls all configured sensors into one measurement ring
pub struct MeasurementManager<R, C = MonotonicClock> {
    config: ManagerConfig,
    sensors: Vec<Arc<SensorInfo>>,
    factory: SensorFactory<R>,
    clock: C,
    ring: MeasurementRing,
    entries: Vec<SensorEntry>,
    /// Slots written by the most recent pass
    written_this_pass: usize,
}

impl<R: PortResolver, C: Clock> MeasurementManager<R, C> {
    /// Create a manager for the given sensor table; no drivers are built yet
    pub fn new(
        config: ManagerConfig,
        sensors: Vec<SensorInfo>,
        resolver: R,
        clock: C,
    ) -> Result<Self, ManagerError> {
        if !(config.threshold_percent > 0.0 && config.threshold_percent <= 100.0) {
            return Err(ManagerError::Threshold(config.threshold_percent));
        }
        let ring = MeasurementRing::new(config.capacity)?;

        info!(
            "Measurement manager created: {} sensors, {} slots, reset at {}%",
            sensors.len(),
            config.capacity,
            config.threshold_percent
        );

        Ok(Self {
            config,
            sensors: sensors.into_iter().map(Arc::new).collect(),
            factory: SensorFactory::new(resolver),
            clock,
            ring,
            entries: Vec::new(),
            written_this_pass: 0,
        })
    }

    /// Build one driver per configuration row; returns how many were built
    ///
    /// Rows that fail keep an entry with no driver so their failure stays
    /// visible in `health()`. Calling this again rebuilds every driver.
    pub fn create_sensors(&mut self) -> usize {
        self.entries.clear();

        for info in &self.sensors {
            let entry = match self.factory.create(Arc::clone(info)) {
                Ok(driver) => SensorEntry {
                    info: Arc::clone(info),
                    driver: Some(driver),
                    health: SensorHealth::new(info.sensor_id, Activation::Pending),
                },
                Err(e) => {
                    warn!("Skipping sensor {}: {}", info.sensor_id, e);
                    SensorEntry {
                        info: Arc::clone(info),
                        driver: None,
                        health: SensorHealth::new(
                            info.sensor_id,
                            Activation::ConstructionFailed(e.to_string()),
                        ),
                    }
                }
            };
            self.entries.push(entry);
        }

        let built = self.entries.iter().filter(|e| e.driver.is_some()).count();
        info!("Constructed {} of {} sensors", built, self.sensors.len());
        built
    }

    /// Run `begin` on every driver that is not ready yet; returns the ready count
    pub async fn begin_sensors(&mut self) -> usize {
        for entry in &mut self.entries {
            if entry.health.activation == Activation::Ready {
                continue;
            }
            let Some(driver) = entry.driver.as_mut() else {
                continue;
            };

            entry.health.activation = match driver.begin().await {
                Ok(()) => Activation::Ready,
                Err(e) => {
                    warn!("Sensor {} failed to start: {}", entry.info.sensor_id, e);
                    Activation::Failed(e.to_string())
                }
            };
        }

        let ready = self.sensors_ready();
        info!("{} of {} sensors ready", ready, self.entries.len());
        ready
    }

    /// Read every measurement of every ready sensor into the ring
    ///
    /// Returns the most recently written slot, if any slot was ever written.
    pub async fn poll_all_sensors(&mut self) -> Option<&RuntimeMeasurement> {
        self.written_this_pass = 0;

        'pass: for entry in &mut self.entries {
            if !entry.is_ready() {
                continue;
            }
            let Some(driver) = entry.driver.as_mut() else {
                continue;
            };

            for measurement_id in entry.info.measurement_ids() {
                let slot = self.ring.reserve();
                *slot = RuntimeMeasurement::pending(entry.info.sensor_id, measurement_id);

                if let Err(e) = driver.read_into(measurement_id, slot, &self.clock).await {
                    warn!(
                        "Sensor {} measurement {}: {}",
                        entry.info.sensor_id, measurement_id, e
                    );
                }
                let status = slot.status;
                entry.health.count(status);
                if status == ReadStatus::IntegrityFailed {
                    metrics::counter!(
                        INTEGRITY_FAILURES,
                        "sensor_id" => entry.info.sensor_id.to_string()
                    )
                    .increment(1);
                }

                let percent = self.ring.commit();
                self.written_this_pass += 1;

                if percent >= self.config.threshold_percent {
                    debug!("Buffer {:.0}% full, resetting cursor", percent);
                    self.ring.reset_cursor();
                    break 'pass;
                }
            }
        }

        self.ring.last()
    }

    /// Index of the slot written most recently
    pub fn last_written_index(&self) -> Option<usize> {
        self.ring.last_written_index()
    }

    /// Slots written by the most recent pass, oldest first
    pub fn last_pass(&self) -> impl Iterator<Item = &RuntimeMeasurement> + '_ {
        self.ring.iter_last(self.written_this_pass)
    }

    /// Copy of the last `count` written slots, oldest first
    pub fn recent(&self, count: usize) -> Vec<RuntimeMeasurement> {
        self.ring.read_last(count)
    }

    /// Per-sensor status in configuration order
    pub fn health(&self) -> impl Iterator<Item = &SensorHealth> + '_ {
        self.entries.iter().map(|e| &e.health)
    }

    pub fn sensors_ready(&self) -> usize {
        self.entries.iter().filter(|e| e.is_ready()).count()
    }

    pub fn buffer_stats(&self) -> RingStats {
        self.ring.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::tests::SimulatedPorts;
    use proptest::prelude::*;
    use sensor_protocol::frame::winsen_checksum;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct FixedClock(u32);

    impl Clock for FixedClock {
        fn now_ms(&self) -> u32 {
            self.0
        }
    }

    /// Valid CO2 response carrying `ppm`
    fn co2_response(ppm: u16) -> [u8; 9] {
        let [hi, lo] = ppm.to_be_bytes();
        let mut frame = [0xFF, 0x86, hi, lo, 0, 0, 0, 0, 0];
        frame[8] = winsen_checksum(&frame);
        frame
    }

    fn manager_for(
        capacity: usize,
        sensors: Vec<SensorInfo>,
        ports: &[u8],
    ) -> (MeasurementManager<SimulatedPorts, FixedClock>, HashMap<u8, DuplexStream>) {
        let (resolver, peers) = SimulatedPorts::with_ports(ports);
        let config = ManagerConfig {
            capacity,
            threshold_percent: 90.0,
        };
        let manager = MeasurementManager::new(config, sensors, resolver, FixedClock(42)).unwrap();
        (manager, peers)
    }

    #[test]
    fn test_rejects_bad_config() {
        let (resolver, _) = SimulatedPorts::with_ports(&[]);
        let zero = ManagerConfig {
            capacity: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            MeasurementManager::new(zero, vec![], resolver, FixedClock(0)),
            Err(ManagerError::Buffer(RingError::ZeroCapacity))
        ));

        let (resolver, _) = SimulatedPorts::with_ports(&[]);
        let over = ManagerConfig {
            threshold_percent: 120.0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            MeasurementManager::new(over, vec![], resolver, FixedClock(0)),
            Err(ManagerError::Threshold(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_reset_ends_pass() {
        // Ids 2..=5 are unsupported by the CO2 model: slot written, no traffic
        let sensors = vec![
            SensorInfo::serial(1, "CO2Sensor", 1, &[1, 2, 3, 4, 5]),
            SensorInfo::serial(2, "CO2Sensor", 2, &[1, 2, 3, 4, 5]),
        ];
        let (mut manager, mut peers) = manager_for(10, sensors, &[1, 2]);
        assert_eq!(manager.create_sensors(), 2);
        assert_eq!(manager.begin_sensors().await, 2);

        for (port, ppm) in [(1u8, 415u16), (2, 980)] {
            peers
                .get_mut(&port)
                .unwrap()
                .write_all(&co2_response(ppm))
                .await
                .unwrap();
        }

        let last = *manager.poll_all_sensors().await.unwrap();
        assert_eq!((last.sensor_id, last.measurement_id), (2, 4));
        assert_eq!(last.status, ReadStatus::Unsupported);

        let stats = manager.buffer_stats();
        assert_eq!(stats.pos, 0);
        assert_eq!(stats.total_writes, 0);
        assert_eq!(manager.last_written_index(), Some(8));

        let pass: Vec<RuntimeMeasurement> = manager.last_pass().copied().collect();
        assert_eq!(pass.len(), 9);
        assert_eq!(pass[0].value, 415.0);
        assert_eq!(pass[0].timestamp_ms, 42);
        assert_eq!(pass[0].status, ReadStatus::Verified);
        assert_eq!(pass[5].sensor_id, 2);
        assert_eq!(pass[5].value, 980.0);
        assert_eq!(pass[1].value, RuntimeMeasurement::SENTINEL);

        // Tenth slot never reached, so it is not part of the history
        let all = manager.recent(10);
        assert_eq!(all.len(), 9);
        assert_eq!(all, pass);
        assert_eq!(manager.buffer_stats().occupied, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_level_across_passes() {
        let sensors = vec![SensorInfo::serial(1, "CO2Sensor", 1, &[1, 2, 3, 4])];
        let (mut manager, _peers) = manager_for(10, sensors, &[1]);
        manager.create_sensors();
        manager.begin_sensors().await;

        let mut levels = Vec::new();
        for _ in 0..4 {
            manager.poll_all_sensors().await;
            levels.push((manager.last_pass().count(), manager.buffer_stats().fill_percent));
        }

        assert_eq!(levels[0], (4, 40.0));
        assert_eq!(levels[1], (4, 80.0));
        // Fifth write of the third pass hits 90% and resets
        assert_eq!(levels[2], (1, 0.0));
        assert_eq!(levels[3], (4, 40.0));

        let health: Vec<&SensorHealth> = manager.health().collect();
        assert_eq!(health[0].timeouts, 4);
        assert_eq!(health[0].unsupported, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbuilt_sensor_never_writes() {
        let sensors = vec![
            SensorInfo::serial(1, "NO2Sensor", 1, &[1]),
            SensorInfo::serial(2, "CO2Sensor", 9, &[1]),
            SensorInfo::serial(3, "CO2Sensor", 3, &[2]),
        ];
        let (mut manager, _peers) = manager_for(10, sensors, &[1, 3]);
        assert_eq!(manager.create_sensors(), 1);
        assert_eq!(manager.begin_sensors().await, 1);

        manager.poll_all_sensors().await;
        let pass: Vec<&RuntimeMeasurement> = manager.last_pass().collect();
        assert_eq!(pass.len(), 1);
        assert_eq!(pass[0].sensor_id, 3);
        assert_eq!(manager.buffer_stats().pos, 1);

        let health: Vec<&SensorHealth> = manager.health().collect();
        assert!(matches!(health[0].activation, Activation::ConstructionFailed(_)));
        assert!(matches!(health[1].activation, Activation::ConstructionFailed(_)));
        assert_eq!(health[2].activation, Activation::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_begin_is_skipped_and_retried() {
        // Port 4 has no simulated line and fails to open
        let sensors = vec![
            SensorInfo::serial(1, "CO2Sensor", 4, &[1]),
            SensorInfo::serial(2, "CO2Sensor", 1, &[2]),
        ];
        let (mut manager, _peers) = manager_for(10, sensors, &[1]);
        assert_eq!(manager.create_sensors(), 2);
        assert_eq!(manager.begin_sensors().await, 1);

        let health: Vec<SensorHealth> = manager.health().cloned().collect();
        assert!(matches!(health[0].activation, Activation::Failed(_)));

        manager.poll_all_sensors().await;
        assert_eq!(manager.last_pass().count(), 1);
        assert!(manager.last_pass().all(|m| m.sensor_id == 2));

        // Retrying leaves the ready sensor alone
        assert_eq!(manager.begin_sensors().await, 1);
        assert_eq!(manager.sensors_ready(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_integrity_failure_recorded() {
        let sensors = vec![SensorInfo::serial(5, "CO2Sensor", 1, &[1])];
        let (mut manager, mut peers) = manager_for(10, sensors, &[1]);
        manager.create_sensors();
        manager.begin_sensors().await;

        let mut frame = co2_response(600);
        frame[2] ^= 0x01;
        let peer = peers.get_mut(&1).unwrap();
        peer.write_all(&frame).await.unwrap();

        let slot = *manager.poll_all_sensors().await.unwrap();
        assert_eq!(slot.status, ReadStatus::IntegrityFailed);
        assert_eq!(slot.value, RuntimeMeasurement::SENTINEL);
        assert_eq!(slot.timestamp_ms, 0);
        assert_eq!(manager.health().next().unwrap().integrity_failures, 1);

        // The request went out on the wire
        let mut request = [0u8; 9];
        tokio::time::timeout(Duration::from_millis(10), peer.read_exact(&mut request))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request, sensor_protocol::drivers::READ_CONCENTRATION);
    }

    #[tokio::test]
    async fn test_empty_manager_returns_none() {
        let (mut manager, _) = manager_for(10, vec![], &[]);
        assert_eq!(manager.create_sensors(), 0);
        assert!(manager.poll_all_sensors().await.is_none());
        assert!(manager.recent(5).is_empty());
    }

    proptest! {
        #[test]
        fn prop_pass_sizes_track_threshold(ids in 1usize..12, passes in 1usize..8) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                // Unsupported ids only: every slot is written without traffic
                let measurement_ids: Vec<u8> = (2..2 + ids as u8).collect();
                let sensors = vec![SensorInfo::serial(1, "CO2Sensor", 1, &measurement_ids)];
                let (mut manager, _peers) = manager_for(10, sensors, &[1]);
                manager.create_sensors();
                manager.begin_sensors().await;

                let mut writes_since_reset = 0usize;
                for _ in 0..passes {
                    manager.poll_all_sensors().await;
                    let written = manager.last_pass().count();
                    let expected = ids.min(9 - writes_since_reset);
                    assert_eq!(written, expected);
                    writes_since_reset = (writes_since_reset + written) % 9;
                    assert_eq!(manager.buffer_stats().pos, writes_since_reset);
                }
            });
        }
    }
}
