//! Plantower PMS7003 Particulate Sensor
//!
//! Runs in passive mode: every read sends a request and then hunts the line
//! for the `42 4D` marker, because the sensor can leave partial frames and
//! acknowledgments between requests. A data frame is 32 bytes:
//!
//! | bytes | content |
//! |-------|---------|
//! | 0-1   | marker `42 4D` |
//! | 2-3   | payload length (28) |
//! | 4-27  | 12 big-endian u16 fields |
//! | 28-29 | reserved |
//! | 30-31 | sum of bytes 0-29 |

use super::{Sensor, DEFAULT_SETTLE, DEFAULT_TIMEOUT};
use crate::config::SensorInfo;
use crate::error::SensorError;
use crate::frame::{
    pms_command, read_u16_be, verify_pms, MarkerScanner, MAX_SYNC_BYTES, PMS_FRAME_LEN,
    PMS_MARKER,
};
use crate::measurement::Sample;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Switch to passive (query) mode
pub const PASSIVE_MODE: [u8; 7] = pms_command(0xE1, 0x0000);

/// Request one data frame while in passive mode
pub const READ_PASSIVE: [u8; 7] = pms_command(0xE2, 0x0000);

/// Number of measurement fields in a data frame
pub const FIELD_COUNT: u8 = 12;

/// Measurement ids, in frame order
pub mod field {
    pub const PM1_0_CF1: u8 = 1;
    pub const PM2_5_CF1: u8 = 2;
    pub const PM10_CF1: u8 = 3;
    pub const PM1_0_ATM: u8 = 4;
    pub const PM2_5_ATM: u8 = 5;
    pub const PM10_ATM: u8 = 6;
    pub const PARTICLES_0_3UM: u8 = 7;
    pub const PARTICLES_0_5UM: u8 = 8;
    pub const PARTICLES_1_0UM: u8 = 9;
    pub const PARTICLES_2_5UM: u8 = 10;
    pub const PARTICLES_5_0UM: u8 = 11;
    pub const PARTICLES_10UM: u8 = 12;
}

/// Byte offset of a measurement inside the data frame
pub fn field_offset(measurement_id: u8) -> Option<usize> {
    (1..=FIELD_COUNT)
        .contains(&measurement_id)
        .then(|| 4 + 2 * (measurement_id as usize - 1))
}

/// Driver for a PMS7003 on a serial line
pub struct Pms7003Sensor {
    info: Arc<SensorInfo>,
    transport: Transport,
    settle: Duration,
    timeout: Duration,
}

impl Pms7003Sensor {
    pub fn new(info: Arc<SensorInfo>, transport: Transport) -> Self {
        let settle = info.settle_or(DEFAULT_SETTLE);
        let timeout = info.timeout_or(DEFAULT_TIMEOUT);
        Self {
            info,
            transport,
            settle,
            timeout,
        }
    }

    /// Align to the next marker and collect the rest of the frame
    async fn capture_frame(&mut self) -> Result<[u8; PMS_FRAME_LEN], SensorError> {
        let mut scanner = MarkerScanner::new(PMS_MARKER);
        loop {
            if scanner.consumed() >= MAX_SYNC_BYTES {
                return Err(SensorError::Malformed(format!(
                    "no frame marker within {} bytes",
                    MAX_SYNC_BYTES
                )));
            }
            let byte = self.transport.read_byte(self.timeout).await?;
            if scanner.feed(byte) {
                break;
            }
        }
        if scanner.discarded() > 0 {
            debug!(
                "PMS7003 (sensor {}): skipped {} bytes before marker",
                self.info.sensor_id,
                scanner.discarded()
            );
        }

        let mut frame = [0u8; PMS_FRAME_LEN];
        frame[..2].copy_from_slice(&PMS_MARKER);
        for slot in frame.iter_mut().skip(2) {
            *slot = self.transport.read_byte(self.timeout).await?;
        }
        Ok(frame)
    }
}

impl Sensor for Pms7003Sensor {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    async fn begin(&mut self) -> Result<(), SensorError> {
        if !self.transport.is_serial() {
            return Err(SensorError::UnexpectedTransport { expected: "serial" });
        }
        self.transport.activate().await?;
        self.transport.send(&PASSIVE_MODE).await?;
        tokio::time::sleep(self.settle).await;
        // Drop the mode-change acknowledgment and any streamed frames
        self.transport.discard_input().await?;
        info!("PMS7003 ready on {}", self.transport.describe());
        Ok(())
    }

    async fn sample(&mut self, measurement_id: u8) -> Result<Sample, SensorError> {
        let offset =
            field_offset(measurement_id).ok_or(SensorError::UnsupportedMeasurement(measurement_id))?;

        self.transport.send(&READ_PASSIVE).await?;
        tokio::time::sleep(self.settle).await;

        let frame = match tokio::time::timeout(self.timeout, self.capture_frame()).await {
            Ok(frame) => frame?,
            Err(_) => return Err(SensorError::Timeout(self.timeout.as_millis() as u64)),
        };
        verify_pms(&frame)?;
        Ok(Sample::verified(read_u16_be(&frame, offset) as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::query::tests::simulated_line;
    use crate::frame::tests::reference_pms_frame;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn sensor_with_peer() -> (Pms7003Sensor, tokio::io::DuplexStream) {
        let (transport, peer) = simulated_line();
        let info = Arc::new(SensorInfo::serial(6, "PMS7003Sensor", 6, &[field::PM2_5_ATM]));
        (Pms7003Sensor::new(info, transport), peer)
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(field_offset(field::PM1_0_CF1), Some(4));
        assert_eq!(field_offset(field::PARTICLES_10UM), Some(26));
        assert_eq!(field_offset(0), None);
        assert_eq!(field_offset(13), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_enters_passive_mode() {
        let (mut sensor, mut peer) = sensor_with_peer();
        // Ack for the mode change
        peer.write_all(&[0x42, 0x4D, 0x00, 0x04, 0xE1, 0x00, 0x01, 0x74]).await.unwrap();
        sensor.begin().await.unwrap();

        let mut command = [0u8; 7];
        peer.read_exact(&mut command).await.unwrap();
        assert_eq!(command, PASSIVE_MODE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resyncs_after_garbage() {
        let reference = reference_pms_frame();
        for k in [0usize, 1, 5, 31] {
            let (mut sensor, mut peer) = sensor_with_peer();
            sensor.begin().await.unwrap();

            let mut stream = vec![0x4D; k];
            stream.extend_from_slice(&reference);
            peer.write_all(&stream).await.unwrap();

            let sample = sensor.sample(field::PM2_5_ATM).await.unwrap();
            let expected = read_u16_be(&reference, field_offset(field::PM2_5_ATM).unwrap());
            assert_eq!(sample.value, expected as f32, "garbage length {}", k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_field_decodes() {
        let reference = reference_pms_frame();
        let (mut sensor, mut peer) = sensor_with_peer();
        sensor.begin().await.unwrap();

        for id in 1..=FIELD_COUNT {
            peer.write_all(&reference).await.unwrap();
            let value = sensor.sample(id).await.unwrap().value;
            let expected = read_u16_be(&reference, field_offset(id).unwrap());
            assert_eq!(value, expected as f32);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_frame_rejected() {
        let mut frame = reference_pms_frame();
        frame[10] ^= 0x01;
        let (mut sensor, mut peer) = sensor_with_peer();
        sensor.begin().await.unwrap();
        peer.write_all(&frame).await.unwrap();

        let err = sensor.sample(field::PM2_5_ATM).await.unwrap_err();
        assert!(matches!(err, SensorError::ChecksumMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_frame_times_out() {
        let frame = reference_pms_frame();
        let (mut sensor, mut peer) = sensor_with_peer();
        sensor.begin().await.unwrap();
        peer.write_all(&frame[..20]).await.unwrap();

        let err = sensor.sample(field::PM2_5_ATM).await.unwrap_err();
        assert_eq!(err.status(), crate::measurement::ReadStatus::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_endless_garbage_is_bounded() {
        let (mut sensor, mut peer) = sensor_with_peer();
        sensor.begin().await.unwrap();
        peer.write_all(&[0x00; MAX_SYNC_BYTES + 10]).await.unwrap();

        let err = sensor.sample(field::PM2_5_ATM).await.unwrap_err();
        assert!(matches!(err, SensorError::Malformed(_)));
    }
}
