//! Air-Quality Sensor Protocols
//!
//! This crate provides the transports (serial lines, I2C buses) and the
//! per-model binary protocol drivers for the gas and particulate sensors of
//! an air-quality monitoring node.

pub mod config;
pub mod drivers;
mod error;
pub mod frame;
mod measurement;
pub mod transport;

pub use config::{CommsKind, MeasurementInfo, SensorInfo};
pub use drivers::{Sensor, SensorDriver, SensorKind, TransportClass};
pub use error::{SensorError, TransportError};
pub use measurement::{Clock, MonotonicClock, ReadStatus, RuntimeMeasurement, Sample};
pub use transport::{I2cTransport, SerialTransport, Transport};
