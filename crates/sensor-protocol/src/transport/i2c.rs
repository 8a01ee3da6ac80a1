//! I2C Bus Transport
//!
//! Register-addressed devices behind an `embedded-hal` I2C bus. On Linux the
//! bus is a `/dev/i2c-N` character device (feature `linux-i2c`).

use crate::error::TransportError;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Failure reported by a bus back-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusFault {
    /// Addressed device did not acknowledge
    NoAcknowledge,
    /// Any other bus failure
    Other(String),
}

/// Object-safe view of an I2C bus
pub trait I2cBus: Send {
    fn write_bytes(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusFault>;
    fn read_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusFault>;
}

impl<T> I2cBus for T
where
    T: I2c + Send,
{
    fn write_bytes(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusFault> {
        I2c::write(self, address, bytes).map_err(|e| fault(e.kind()))
    }

    fn read_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        I2c::read(self, address, buf).map_err(|e| fault(e.kind()))
    }
}

fn fault(kind: ErrorKind) -> BusFault {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusFault::NoAcknowledge,
        other => BusFault::Other(format!("{:?}", other)),
    }
}

enum BusState {
    Closed { path: String },
    Open(Box<dyn I2cBus>),
}

/// Transport for one device on an I2C bus
pub struct I2cTransport {
    label: String,
    address: u8,
    clock_hz: u32,
    state: BusState,
}

impl I2cTransport {
    /// Transport for a bus device path, opened on activation
    pub fn new(path: &str, address: u8, clock_hz: u32) -> Self {
        Self {
            label: path.to_string(),
            address,
            clock_hz,
            state: BusState::Closed {
                path: path.to_string(),
            },
        }
    }

    /// Transport over an already-open bus
    pub fn from_bus<B: I2cBus + 'static>(label: &str, bus: B, address: u8, clock_hz: u32) -> Self {
        Self {
            label: label.to_string(),
            address,
            clock_hz,
            state: BusState::Open(Box::new(bus)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Open the bus and check that the device acknowledges its address
    pub async fn activate(&mut self) -> Result<(), TransportError> {
        if let BusState::Closed { path } = &self.state {
            let bus = open_bus(path)?;
            self.state = BusState::Open(bus);
        }

        // Clock rate is owned by the bus driver on hosted targets
        debug!("{} requested clock {} Hz", self.label, self.clock_hz);

        let address = self.address;
        let ack = self.bus()?.write_bytes(address, &[]);
        match ack {
            Ok(()) => {
                info!("I2C device 0x{:02X} on {} responded", address, self.label);
                Ok(())
            }
            Err(BusFault::NoAcknowledge) => {
                warn!("I2C device 0x{:02X} on {} did not respond", address, self.label);
                self.sweep()?;
                Err(TransportError::NoAcknowledge(address))
            }
            Err(BusFault::Other(reason)) => Err(TransportError::Bus(reason)),
        }
    }

    fn bus(&mut self) -> Result<&mut Box<dyn I2cBus>, TransportError> {
        match &mut self.state {
            BusState::Open(bus) => Ok(bus),
            BusState::Closed { .. } => Err(TransportError::NotActivated),
        }
    }

    /// Write a command (typically a register pointer, optionally a value)
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let address = self.address;
        trace!("0x{:02X} <- {:02X?}", address, bytes);
        self.bus()?
            .write_bytes(address, bytes)
            .map_err(|f| bus_error(address, f))
    }

    /// Read `max` bytes from the device
    pub async fn receive(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError> {
        let address = self.address;
        let max = max.min(buf.len());
        self.bus()?
            .read_bytes(address, &mut buf[..max])
            .map_err(|f| bus_error(address, f))?;
        trace!("0x{:02X} -> {:02X?}", address, &buf[..max]);
        Ok(max)
    }

    /// Read a single byte; bus reads complete or fail on their own
    pub async fn read_byte(&mut self, _deadline: Duration) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.receive(&mut byte, 1).await?;
        Ok(byte[0])
    }

    /// Write a register pointer, then read `buf.len()` bytes from it
    pub async fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        self.send(&[register]).await?;
        let len = buf.len();
        self.receive(buf, len).await?;
        Ok(())
    }

    /// Address every 7-bit device and return the ones that acknowledge
    pub fn sweep(&mut self) -> Result<Vec<u8>, TransportError> {
        let label = self.label.clone();
        let bus = self.bus()?;
        let found: Vec<u8> = (0x01..0x7F)
            .filter(|&addr| bus.write_bytes(addr, &[]).is_ok())
            .collect();
        debug!("I2C sweep on {}: {:02X?}", label, found);
        Ok(found)
    }
}

impl std::fmt::Debug for I2cTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cTransport")
            .field("label", &self.label)
            .field("address", &format_args!("0x{:02X}", self.address))
            .field("clock_hz", &self.clock_hz)
            .finish()
    }
}

fn bus_error(address: u8, fault: BusFault) -> TransportError {
    match fault {
        BusFault::NoAcknowledge => TransportError::NoAcknowledge(address),
        BusFault::Other(reason) => TransportError::Bus(reason),
    }
}

#[cfg(feature = "linux-i2c")]
fn open_bus(path: &str) -> Result<Box<dyn I2cBus>, TransportError> {
    info!("Opening I2C bus {}", path);
    let dev = linux_embedded_hal::I2cdev::new(path).map_err(|e| TransportError::Open {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Box::new(dev))
}

#[cfg(not(feature = "linux-i2c"))]
fn open_bus(path: &str) -> Result<Box<dyn I2cBus>, TransportError> {
    warn!("I2C bus {} requested but linux-i2c support is not compiled in", path);
    Err(TransportError::Unsupported("i2c"))
}
