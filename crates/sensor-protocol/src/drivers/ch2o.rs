//! Dart WZ-S-K Formaldehyde Module
//!
//! Same 9-byte query protocol as the Winsen gas family.

use super::query::{Field, QueryModel, QuerySensor};
use crate::frame::{winsen_command, WINSEN_FRAME_LEN};

/// CH2O concentration (ppb)
pub const CH2O_PPB: u8 = 1;
/// CH2O concentration (ug/m3)
pub const CH2O_UG_M3: u8 = 2;

pub struct WzsFormaldehyde;

impl QueryModel for WzsFormaldehyde {
    const MODEL: &'static str = "WZ-S-K";
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]> = Some(winsen_command(0x78, [0x41, 0, 0, 0, 0]));

    fn field(measurement_id: u8) -> Option<Field> {
        match measurement_id {
            CH2O_PPB => Some(Field::U16Be(6)),
            CH2O_UG_M3 => Some(Field::U16Be(2)),
            _ => None,
        }
    }
}

pub type Ch2oSensor = QuerySensor<WzsFormaldehyde>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorInfo;
    use crate::drivers::query::tests::simulated_line;
    use crate::drivers::Sensor;
    use crate::error::SensorError;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    #[tokio::test(start_paused = true)]
    async fn test_reference_response_decodes_300() {
        let (transport, mut peer) = simulated_line();
        let info = Arc::new(SensorInfo::serial(2, "CH2OSensor", 2, &[CH2O_PPB]));
        let mut sensor = Ch2oSensor::new(info, transport);
        sensor.begin().await.unwrap();

        peer.write_all(&[0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x01, 0x2C, 0x4C])
            .await
            .unwrap();
        let sample = sensor.sample(CH2O_PPB).await.unwrap();
        assert_eq!(sample.value, 300.0);
        assert!(sample.verified);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_response_rejected() {
        let (transport, mut peer) = simulated_line();
        let info = Arc::new(SensorInfo::serial(2, "CH2OSensor", 2, &[CH2O_PPB]));
        let mut sensor = Ch2oSensor::new(info, transport);
        sensor.begin().await.unwrap();

        peer.write_all(&[0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x01, 0x2D, 0x4C])
            .await
            .unwrap();
        let err = sensor.sample(CH2O_PPB).await.unwrap_err();
        assert!(matches!(
            err,
            SensorError::ChecksumMismatch {
                expected: 0x4B,
                actual: 0x4C
            }
        ));
    }
}
