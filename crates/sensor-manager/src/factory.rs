//! Driver Factory
//!
//! Turns a configuration row into a driver that owns its transport.

use crate::ports::{PortResolver, SerialSelector};
use sensor_protocol::{
    CommsKind, SensorDriver, SensorInfo, SensorKind, Transport, TransportClass, TransportError,
};
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Hardware serial port numbers the node supports
pub const HARDWARE_SERIAL_PORTS: RangeInclusive<u8> = 1..=8;

/// I2C bus indices the node supports
pub const I2C_BUSES: RangeInclusive<u8> = 0..=2;

/// Reasons a configured sensor could not be constructed
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Sensor {sensor_id}: unknown sensor type '{tag}'")]
    UnknownSensorType { sensor_id: u16, tag: String },

    #[error("Sensor {sensor_id}: {source}")]
    Transport {
        sensor_id: u16,
        #[source]
        source: TransportError,
    },

    #[error("Sensor {sensor_id}: {kind} cannot run over {comms:?}")]
    IncompatibleTransport {
        sensor_id: u16,
        kind: SensorKind,
        comms: CommsKind,
    },
}

/// Builds drivers, resolving their ports through `R`
pub struct SensorFactory<R> {
    resolver: R,
}

impl<R: PortResolver> SensorFactory<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Build the driver for one sensor
    pub fn create(&mut self, info: Arc<SensorInfo>) -> Result<SensorDriver, FactoryError> {
        let sensor_id = info.sensor_id;
        let kind: SensorKind = info
            .sensor_type
            .parse()
            .map_err(|tag| FactoryError::UnknownSensorType { sensor_id, tag })?;

        let compatible = match kind.transport_class() {
            TransportClass::Serial => info.comms.is_serial(),
            TransportClass::I2c => info.comms == CommsKind::I2c,
        };
        if !compatible {
            return Err(FactoryError::IncompatibleTransport {
                sensor_id,
                kind,
                comms: info.comms,
            });
        }

        let transport = self
            .resolve(&info)
            .map_err(|source| FactoryError::Transport { sensor_id, source })?;

        debug!("Sensor {} built as {} on {}", sensor_id, kind, transport.describe());
        Ok(SensorDriver::build(kind, info, transport))
    }

    fn resolve(&mut self, info: &SensorInfo) -> Result<Transport, TransportError> {
        match info.comms {
            CommsKind::HardwareSerial => {
                if !HARDWARE_SERIAL_PORTS.contains(&info.port_no) {
                    return Err(TransportError::NoSuchPort(format!(
                        "hardware serial port {}",
                        info.port_no
                    )));
                }
                self.resolver
                    .serial(SerialSelector::Hardware(info.port_no), info.baud_rate)
            }
            CommsKind::SoftwareSerial => match (info.rx_pin, info.tx_pin) {
                (Some(rx_pin), Some(tx_pin)) => self
                    .resolver
                    .serial(SerialSelector::Software { rx_pin, tx_pin }, info.baud_rate),
                _ => Err(TransportError::NoSuchPort(
                    "software serial without rx/tx pins".to_string(),
                )),
            },
            CommsKind::I2c => {
                if !I2C_BUSES.contains(&info.port_no) {
                    return Err(TransportError::NoSuchPort(format!("i2c bus {}", info.port_no)));
                }
                self.resolver
                    .i2c(info.port_no, info.i2c_address, info.clock_speed_hz)
            }
        }
    }
}
