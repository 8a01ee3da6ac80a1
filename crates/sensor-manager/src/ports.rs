//! Port Resolution
//!
//! Maps the numeric selectors used in sensor configuration (hardware serial
//! port, software serial pin pair, I2C bus index) to transports on the host.

use sensor_protocol::{I2cTransport, SerialTransport, Transport, TransportError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which serial line a sensor is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialSelector {
    /// On-chip UART by port number
    Hardware(u8),
    /// Bit-banged UART on an RX/TX pin pair
    Software { rx_pin: u8, tx_pin: u8 },
}

/// Source of not-yet-activated transports
pub trait PortResolver {
    fn serial(&mut self, selector: SerialSelector, baud_rate: u32)
        -> Result<Transport, TransportError>;

    fn i2c(&mut self, bus: u8, address: u8, clock_hz: u32) -> Result<Transport, TransportError>;
}

/// Hardware serial port number to device path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    pub port_no: u8,
    pub path: String,
}

/// Software serial pin pair to device path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinPairMapping {
    pub rx_pin: u8,
    pub tx_pin: u8,
    pub path: String,
}

/// I2C bus index to bus device path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMapping {
    pub bus: u8,
    pub path: String,
}

/// Device paths of the host the node runs on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostPorts {
    #[serde(default)]
    pub serial: Vec<PortMapping>,
    #[serde(default)]
    pub software_serial: Vec<PinPairMapping>,
    #[serde(default)]
    pub i2c: Vec<BusMapping>,
}

impl HostPorts {
    fn serial_path(&self, selector: SerialSelector) -> Option<&str> {
        match selector {
            SerialSelector::Hardware(port_no) => self
                .serial
                .iter()
                .find(|m| m.port_no == port_no)
                .map(|m| m.path.as_str()),
            SerialSelector::Software { rx_pin, tx_pin } => self
                .software_serial
                .iter()
                .find(|m| m.rx_pin == rx_pin && m.tx_pin == tx_pin)
                .map(|m| m.path.as_str()),
        }
    }

    fn bus_path(&self, bus: u8) -> Option<&str> {
        self.i2c.iter().find(|m| m.bus == bus).map(|m| m.path.as_str())
    }
}

impl PortResolver for HostPorts {
    fn serial(
        &mut self,
        selector: SerialSelector,
        baud_rate: u32,
    ) -> Result<Transport, TransportError> {
        let path = self
            .serial_path(selector)
            .ok_or_else(|| TransportError::NoSuchPort(format!("{:?}", selector)))?;
        debug!("{:?} -> {}", selector, path);
        Ok(SerialTransport::new(path, baud_rate).into())
    }

    fn i2c(&mut self, bus: u8, address: u8, clock_hz: u32) -> Result<Transport, TransportError> {
        let path = self
            .bus_path(bus)
            .ok_or_else(|| TransportError::NoSuchPort(format!("i2c bus {}", bus)))?;
        debug!("i2c bus {} -> {}", bus, path);
        Ok(I2cTransport::new(path, address, clock_hz).into())
    }
}
