//! DFRobot SEN0322 Electrochemical Oxygen Sensor (I2C)
//!
//! The module stores a calibration key in flash; the oxygen register holds
//! an integer, tenths and hundredths byte that are multiplied by that key.
//! The protocol carries no checksum, so values are reported as unverified.

use super::Sensor;
use crate::config::SensorInfo;
use crate::error::SensorError;
use crate::measurement::Sample;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, info};

/// Oxygen concentration (%vol)
pub const OXYGEN_PERCENT: u8 = 1;

/// Register holding the 3-byte oxygen reading
pub const OXYGEN_DATA_REGISTER: u8 = 0x03;

/// Register holding the calibration key
pub const GET_KEY_REGISTER: u8 = 0x0A;

/// Key used when the module has never been calibrated
pub const FACTORY_KEY: f32 = 20.9 / 120.0;

/// Convert the stored key byte into a multiplier
pub fn key_from_register(raw: u8) -> f32 {
    if raw == 0 {
        FACTORY_KEY
    } else {
        raw as f32 / 1000.0
    }
}

/// Driver for a SEN0322 on an I2C bus
pub struct OxygenSensor {
    info: Arc<SensorInfo>,
    transport: Transport,
    key: f32,
}

impl OxygenSensor {
    pub fn new(info: Arc<SensorInfo>, transport: Transport) -> Self {
        Self {
            info,
            transport,
            key: FACTORY_KEY,
        }
    }

    /// Calibration multiplier loaded by `begin`
    pub fn key(&self) -> f32 {
        self.key
    }

    async fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        match &mut self.transport {
            Transport::I2c(bus) => Ok(bus.read_register(register, buf).await?),
            Transport::Serial(_) => Err(SensorError::UnexpectedTransport { expected: "i2c" }),
        }
    }
}

impl Sensor for OxygenSensor {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    async fn begin(&mut self) -> Result<(), SensorError> {
        if self.transport.is_serial() {
            return Err(SensorError::UnexpectedTransport { expected: "i2c" });
        }
        self.transport.activate().await?;

        let mut raw = [0u8; 1];
        self.read_register(GET_KEY_REGISTER, &mut raw).await?;
        self.key = key_from_register(raw[0]);
        debug!("SEN0322 (sensor {}): key {:.5}", self.info.sensor_id, self.key);

        info!("SEN0322 ready on {}", self.transport.describe());
        Ok(())
    }

    async fn sample(&mut self, measurement_id: u8) -> Result<Sample, SensorError> {
        if measurement_id != OXYGEN_PERCENT {
            return Err(SensorError::UnsupportedMeasurement(measurement_id));
        }
        let mut raw = [0u8; 3];
        self.read_register(OXYGEN_DATA_REGISTER, &mut raw).await?;
        let reading = raw[0] as f32 + raw[1] as f32 / 10.0 + raw[2] as f32 / 100.0;
        Ok(Sample::unverified(self.key * reading))
    }
}
