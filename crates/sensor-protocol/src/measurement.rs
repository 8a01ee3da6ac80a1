//! Runtime Measurement Records

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Outcome recorded alongside a measurement slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Slot reserved, no successful read yet
    #[default]
    Pending,
    /// Decoded and integrity-checked
    Verified,
    /// Decoded from a protocol with no integrity field
    Unverified,
    /// Checksum mismatch or malformed frame
    IntegrityFailed,
    /// Device did not answer before the deadline
    TimedOut,
    /// Sensor does not provide the requested measurement
    Unsupported,
    /// Transport error during the exchange
    TransportFailed,
}

impl ReadStatus {
    /// Whether the slot carries a decoded value
    pub fn has_value(&self) -> bool {
        matches!(self, ReadStatus::Verified | ReadStatus::Unverified)
    }
}

/// One measurement slot in the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMeasurement {
    pub sensor_id: u16,
    pub measurement_id: u8,
    pub value: f32,
    /// Monotonic millisecond counter at decode time
    pub timestamp_ms: u32,
    pub status: ReadStatus,
}

impl RuntimeMeasurement {
    /// Value held by a slot that has not been successfully read
    pub const SENTINEL: f32 = -1.0;

    /// Fresh slot for a pending read
    pub fn pending(sensor_id: u16, measurement_id: u8) -> Self {
        Self {
            sensor_id,
            measurement_id,
            value: Self::SENTINEL,
            timestamp_ms: 0,
            status: ReadStatus::Pending,
        }
    }

    /// Store a decoded sample
    pub fn record(&mut self, sample: Sample, timestamp_ms: u32) {
        self.value = sample.value;
        self.timestamp_ms = timestamp_ms;
        self.status = if sample.verified {
            ReadStatus::Verified
        } else {
            ReadStatus::Unverified
        };
    }

    /// Whether this slot carries a decoded value
    pub fn is_valid(&self) -> bool {
        self.status.has_value()
    }
}

impl Default for RuntimeMeasurement {
    fn default() -> Self {
        Self::pending(0, 0)
    }
}

/// A decoded value as produced by a driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f32,
    /// False when the protocol offers no integrity check
    pub verified: bool,
}

impl Sample {
    pub fn verified(value: f32) -> Self {
        Self {
            value,
            verified: true,
        }
    }

    pub fn unverified(value: f32) -> Self {
        Self {
            value,
            verified: false,
        }
    }
}

/// Monotonic millisecond time source used to stamp measurements
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Milliseconds since the clock was created, wrapping at `u32::MAX`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Wraps after ~49.7 days, same as the MCU millis() counter
        self.start.elapsed().as_millis() as u32
    }
}
