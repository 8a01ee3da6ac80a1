//! Static Sensor Configuration
//!
//! One `SensorInfo` per physical sensor. Loaded once at startup and shared
//! read-only with the driver that serves it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default I2C clock speed (Hz)
pub const DEFAULT_I2C_CLOCK_HZ: u32 = 100_000;

/// Default serial baud rate for the supported sensor family
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How a sensor is attached to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommsKind {
    /// On-chip UART, selected by port number
    HardwareSerial,
    /// Bit-banged UART on explicit RX/TX pins
    SoftwareSerial,
    /// Register-addressed I2C bus, selected by bus index
    I2c,
}

impl CommsKind {
    /// Whether this kind carries a byte stream (as opposed to a bus)
    pub fn is_serial(&self) -> bool {
        matches!(self, CommsKind::HardwareSerial | CommsKind::SoftwareSerial)
    }
}

/// A physical quantity a sensor can report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementInfo {
    /// Protocol-level measurement identifier
    pub measurement_id: u8,
    /// Human-readable name (e.g. "pm2_5_atm")
    #[serde(default)]
    pub name: String,
    /// Unit label (e.g. "ug/m3")
    #[serde(default)]
    pub unit: String,
}

impl MeasurementInfo {
    pub fn new(measurement_id: u8) -> Self {
        Self {
            measurement_id,
            name: String::new(),
            unit: String::new(),
        }
    }
}

/// Static description of one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Node-unique sensor identifier
    pub sensor_id: u16,
    /// Driver type tag (e.g. "PMS7003Sensor")
    pub sensor_type: String,
    /// Manufacturer part name, for reports
    #[serde(default)]
    pub part_name: String,
    /// Transport kind
    pub comms: CommsKind,
    /// Hardware serial port number or I2C bus index
    #[serde(default)]
    pub port_no: u8,
    /// Software serial RX pin
    #[serde(default)]
    pub rx_pin: Option<u8>,
    /// Software serial TX pin
    #[serde(default)]
    pub tx_pin: Option<u8>,
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// 7-bit I2C address
    #[serde(default)]
    pub i2c_address: u8,
    /// I2C clock speed (Hz)
    #[serde(default = "default_clock_speed")]
    pub clock_speed_hz: u32,
    /// Override for the command settle delay (ms)
    #[serde(default)]
    pub settle_ms: Option<u64>,
    /// Override for the response deadline (ms)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Measurements polled from this sensor, in order
    #[serde(default)]
    pub measurements: Vec<MeasurementInfo>,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_clock_speed() -> u32 {
    DEFAULT_I2C_CLOCK_HZ
}

impl SensorInfo {
    /// Minimal serial sensor description, mostly useful in tests
    pub fn serial(sensor_id: u16, sensor_type: &str, port_no: u8, measurements: &[u8]) -> Self {
        Self {
            sensor_id,
            sensor_type: sensor_type.to_string(),
            part_name: String::new(),
            comms: CommsKind::HardwareSerial,
            port_no,
            rx_pin: None,
            tx_pin: None,
            baud_rate: DEFAULT_BAUD_RATE,
            i2c_address: 0,
            clock_speed_hz: DEFAULT_I2C_CLOCK_HZ,
            settle_ms: None,
            timeout_ms: None,
            measurements: measurements.iter().copied().map(MeasurementInfo::new).collect(),
        }
    }

    /// Minimal I2C sensor description
    pub fn i2c(sensor_id: u16, sensor_type: &str, bus: u8, address: u8, measurements: &[u8]) -> Self {
        Self {
            comms: CommsKind::I2c,
            i2c_address: address,
            ..Self::serial(sensor_id, sensor_type, bus, measurements)
        }
    }

    /// Settle delay, falling back to the driver default
    pub fn settle_or(&self, default: Duration) -> Duration {
        self.settle_ms.map(Duration::from_millis).unwrap_or(default)
    }

    /// Response deadline, falling back to the driver default
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }

    /// Measurement ids in polling order
    pub fn measurement_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.measurements.iter().map(|m| m.measurement_id)
    }
}
