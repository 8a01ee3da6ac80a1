//! Transport and Sensor Error Types

use crate::measurement::ReadStatus;
use thiserror::Error;

/// Errors raised by a byte-level transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted before `activate()`
    #[error("Transport used before activation")]
    NotActivated,

    /// The port/bus selector does not exist on this platform
    #[error("No such port: {0}")]
    NoSuchPort(String),

    /// The underlying device could not be opened
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Bus device did not acknowledge its address
    #[error("No acknowledge from I2C device at 0x{0:02X}")]
    NoAcknowledge(u8),

    /// Serial I/O failure
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I2C bus failure other than a missing acknowledge
    #[error("I2C bus error: {0}")]
    Bus(String),

    /// Deadline expired while waiting for data
    #[error("Timeout waiting for data after {0}ms")]
    Timeout(u64),

    /// Transport kind not available in this build
    #[error("Transport not supported in this build: {0}")]
    Unsupported(&'static str),
}

/// Errors raised while activating or reading a sensor
#[derive(Debug, Error)]
pub enum SensorError {
    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Integrity field did not match the frame contents
    #[error("Checksum mismatch: expected {expected:04X}, got {actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Frame arrived but its layout is wrong
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// Response did not arrive before the deadline
    #[error("Timeout waiting for sensor response after {0}ms")]
    Timeout(u64),

    /// The model has no such measurement
    #[error("Measurement {0} not supported by this sensor")]
    UnsupportedMeasurement(u8),

    /// Driver was wired to a transport its protocol cannot use
    #[error("Sensor requires {expected} transport")]
    UnexpectedTransport { expected: &'static str },
}

impl SensorError {
    /// Slot status recorded for a read that failed with this error
    pub fn status(&self) -> ReadStatus {
        match self {
            SensorError::ChecksumMismatch { .. } | SensorError::Malformed(_) => {
                ReadStatus::IntegrityFailed
            }
            SensorError::Timeout(_) | SensorError::Transport(TransportError::Timeout(_)) => {
                ReadStatus::TimedOut
            }
            SensorError::UnsupportedMeasurement(_) => ReadStatus::Unsupported,
            SensorError::Transport(_) | SensorError::UnexpectedTransport { .. } => {
                ReadStatus::TransportFailed
            }
        }
    }
}
