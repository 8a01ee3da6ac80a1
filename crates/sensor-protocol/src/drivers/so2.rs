//! Winsen ZE03-SO2
//!
//! Defaults to active upload; `begin` switches it to question/answer mode.

use super::query::{Field, QueryModel, QuerySensor};
use crate::frame::{winsen_command, WINSEN_FRAME_LEN};
use std::time::Duration;

/// SO2 concentration
pub const SO2_CONCENTRATION: u8 = 1;

pub struct Ze03So2;

impl QueryModel for Ze03So2 {
    const MODEL: &'static str = "ZE03-SO2";
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]> = Some(winsen_command(0x78, [0x04, 0, 0, 0, 0]));
    const ACTIVATION_SETTLE: Duration = Duration::from_millis(1000);

    fn field(measurement_id: u8) -> Option<Field> {
        (measurement_id == SO2_CONCENTRATION).then_some(Field::U16Be(2))
    }
}

pub type So2Sensor = QuerySensor<Ze03So2>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorInfo;
    use crate::drivers::query::tests::{response, simulated_line};
    use crate::drivers::Sensor;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_waits_one_second() {
        let (transport, mut peer) = simulated_line();
        let info = Arc::new(SensorInfo::serial(3, "SO2Sensor", 3, &[SO2_CONCENTRATION]));
        let mut sensor = So2Sensor::new(info, transport);

        // Stale active-upload frame is flushed by begin()
        peer.write_all(&response([0x17, 0x04, 0x00, 0x00, 0x25, 0x13, 0x88])).await.unwrap();

        let started = Instant::now();
        sensor.begin().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));

        let mut command = [0u8; 9];
        peer.read_exact(&mut command).await.unwrap();
        assert_eq!(command[8], 0x83);

        peer.write_all(&response([0x86, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00])).await.unwrap();
        assert_eq!(sensor.sample(SO2_CONCENTRATION).await.unwrap().value, 5.0);
    }
}
