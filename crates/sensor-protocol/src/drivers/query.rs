//! Query-Mode Driver for 9-Byte Frame Sensors
//!
//! Winsen, Dart and DFRobot UART gas sensors share one exchange: send a
//! 9-byte request, wait, read a 9-byte response whose last byte is the
//! Winsen checksum. Models differ only in their activation command and in
//! where each measurement sits in the response.

use super::{Sensor, DEFAULT_SETTLE};
use crate::config::SensorInfo;
use crate::error::SensorError;
use crate::frame::{read_u16_be, verify_winsen, winsen_command, WINSEN_FRAME_LEN, WINSEN_START};
use crate::measurement::Sample;
use crate::transport::Transport;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Request for the latest gas concentration
pub const READ_CONCENTRATION: [u8; WINSEN_FRAME_LEN] = winsen_command(0x86, [0; 5]);

/// Bytes drained per exchange when looking for the response frame
const RESPONSE_SCAN_LEN: usize = 4 * WINSEN_FRAME_LEN;

/// Where a measurement lives inside a response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Big-endian u16 at the given offset
    U16Be(usize),
    /// Big-endian u16 scaled by 10^-n, with n read from `decimals_at`
    Scaled { offset: usize, decimals_at: usize },
}

impl Field {
    pub fn decode(&self, frame: &[u8; WINSEN_FRAME_LEN]) -> Result<f32, SensorError> {
        match *self {
            Field::U16Be(offset) => Ok(read_u16_be(frame, offset) as f32),
            Field::Scaled {
                offset,
                decimals_at,
            } => {
                let raw = read_u16_be(frame, offset) as f32;
                match frame[decimals_at] {
                    0 => Ok(raw),
                    1 => Ok(raw / 10.0),
                    2 => Ok(raw / 100.0),
                    n => Err(SensorError::Malformed(format!("decimal places {} out of range", n))),
                }
            }
        }
    }
}

/// Per-model constants of a query-mode sensor
pub trait QueryModel: Send + Sync + 'static {
    /// Part name used in log lines
    const MODEL: &'static str;

    /// Command that switches the device into query mode, if it needs one
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]>;

    /// Wait after the activation command
    const ACTIVATION_SETTLE: Duration = DEFAULT_SETTLE;

    /// Response field for a measurement id, `None` if unsupported
    fn field(measurement_id: u8) -> Option<Field>;
}

/// Driver for a query-mode sensor of model `M`
pub struct QuerySensor<M: QueryModel> {
    info: Arc<SensorInfo>,
    transport: Transport,
    settle: Duration,
    _model: PhantomData<M>,
}

impl<M: QueryModel> QuerySensor<M> {
    pub fn new(info: Arc<SensorInfo>, transport: Transport) -> Self {
        let settle = info.settle_or(DEFAULT_SETTLE);
        Self {
            info,
            transport,
            settle,
            _model: PhantomData,
        }
    }

    /// Send the read request and collect a verified response
    async fn exchange(&mut self) -> Result<[u8; WINSEN_FRAME_LEN], SensorError> {
        self.transport.send(&READ_CONCENTRATION).await?;
        tokio::time::sleep(self.settle).await;

        let mut pending = [0u8; RESPONSE_SCAN_LEN];
        let got = self
            .transport
            .receive(&mut pending, RESPONSE_SCAN_LEN)
            .await?;
        if got == 0 {
            return Err(SensorError::Timeout(self.settle.as_millis() as u64));
        }
        if got == RESPONSE_SCAN_LEN {
            self.transport.discard_input().await?;
        }
        if got > WINSEN_FRAME_LEN {
            debug!(
                "{} (sensor {}): {} bytes pending, resynchronising",
                M::MODEL,
                self.info.sensor_id,
                got
            );
        }

        latest_frame(&pending[..got])
    }
}

/// Pick the newest verified 9-byte frame out of whatever the line delivered
///
/// Leftovers of a late or partial reply sit in front of the fresh one, so
/// candidate windows are checked from the end. When none verifies, the error
/// is the one for the window at the start of the data.
fn latest_frame(bytes: &[u8]) -> Result<[u8; WINSEN_FRAME_LEN], SensorError> {
    if bytes.len() < WINSEN_FRAME_LEN {
        return Err(SensorError::Malformed(format!(
            "short response: {} of {} bytes",
            bytes.len(),
            WINSEN_FRAME_LEN
        )));
    }

    let newest = bytes
        .windows(WINSEN_FRAME_LEN)
        .rev()
        .filter(|w| w[0] == WINSEN_START)
        .filter_map(|w| <[u8; WINSEN_FRAME_LEN]>::try_from(w).ok())
        .find(|frame| verify_winsen(frame).is_ok());
    if let Some(frame) = newest {
        return Ok(frame);
    }

    let mut head = [0u8; WINSEN_FRAME_LEN];
    head.copy_from_slice(&bytes[..WINSEN_FRAME_LEN]);
    verify_winsen(&head)?;
    Ok(head)
}

impl<M: QueryModel> Sensor for QuerySensor<M> {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    async fn begin(&mut self) -> Result<(), SensorError> {
        if !self.transport.is_serial() {
            return Err(SensorError::UnexpectedTransport { expected: "serial" });
        }
        self.transport.activate().await?;

        if let Some(command) = M::ACTIVATION {
            debug!("{} (sensor {}): entering query mode", M::MODEL, self.info.sensor_id);
            self.transport.send(&command).await?;
            tokio::time::sleep(M::ACTIVATION_SETTLE).await;
            self.transport.discard_input().await?;
        }

        info!("{} ready on {}", M::MODEL, self.transport.describe());
        Ok(())
    }

    async fn sample(&mut self, measurement_id: u8) -> Result<Sample, SensorError> {
        let field =
            M::field(measurement_id).ok_or(SensorError::UnsupportedMeasurement(measurement_id))?;
        let response = self.exchange().await?;
        Ok(Sample::verified(field.decode(&response)?))
    }
}
