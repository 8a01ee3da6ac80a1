//! Sensor Transports
//!
//! A transport is the byte-level channel a driver talks through. It is
//! either a serial line or a device on an I2C bus; each transport is owned
//! by exactly one driver.

mod i2c;
mod serial;

pub use i2c::{BusFault, I2cBus, I2cTransport};
pub use serial::{SerialLine, SerialTransport};

use crate::error::TransportError;
use std::time::Duration;

/// Byte-level channel to a single sensor
#[derive(Debug)]
pub enum Transport {
    Serial(SerialTransport),
    I2c(I2cTransport),
}

impl Transport {
    /// One-time line/bus setup
    pub async fn activate(&mut self) -> Result<(), TransportError> {
        match self {
            Transport::Serial(t) => t.activate().await,
            Transport::I2c(t) => t.activate().await,
        }
    }

    /// Write a whole command frame
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Serial(t) => t.send(bytes).await,
            Transport::I2c(t) => t.send(bytes).await,
        }
    }

    /// Collect up to `max` bytes without waiting for more to arrive
    pub async fn receive(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError> {
        match self {
            Transport::Serial(t) => t.receive(buf, max).await,
            Transport::I2c(t) => t.receive(buf, max).await,
        }
    }

    /// Wait for one byte, failing once `deadline` has passed
    pub async fn read_byte(&mut self, deadline: Duration) -> Result<u8, TransportError> {
        match self {
            Transport::Serial(t) => t.read_byte(deadline).await,
            Transport::I2c(t) => t.read_byte(deadline).await,
        }
    }

    /// Drop pending input on stream transports; no-op on a bus
    pub async fn discard_input(&mut self) -> Result<usize, TransportError> {
        match self {
            Transport::Serial(t) => t.discard_input().await,
            Transport::I2c(_) => Ok(0),
        }
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, Transport::Serial(_))
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        match self {
            Transport::Serial(t) => format!("serial {}", t.label()),
            Transport::I2c(t) => format!("i2c {} @0x{:02X}", t.label(), t.address()),
        }
    }
}

impl From<SerialTransport> for Transport {
    fn from(t: SerialTransport) -> Self {
        Transport::Serial(t)
    }
}

impl From<I2cTransport> for Transport {
    fn from(t: I2cTransport) -> Self {
        Transport::I2c(t)
    }
}

#[cfg(test)]
pub(crate) use i2c::tests::FakeBus;
