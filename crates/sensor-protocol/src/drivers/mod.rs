//! Sensor Drivers
//!
//! Every model follows request → settle → capture → verify → extract, but
//! command bytes, frame layout and integrity rules are fixed per model, so
//! each model gets its own driver type. `SensorDriver` is the closed set of
//! supported models.

mod ch2o;
mod co;
mod co2;
mod oxygen;
mod pms7003;
mod query;
mod so2;
mod tvoc;

pub use ch2o::{Ch2oSensor, WzsFormaldehyde, CH2O_PPB, CH2O_UG_M3};
pub use co::{CoSensor, DfRobotGasCo, CO_PPM};
pub use co2::{Co2Sensor, Mhz19c, CO2_PPM};
pub use oxygen::{key_from_register, OxygenSensor, FACTORY_KEY, OXYGEN_PERCENT};
pub use pms7003::{field as pm_field, field_offset as pm_field_offset, Pms7003Sensor};
pub use query::{Field, QueryModel, QuerySensor, READ_CONCENTRATION};
pub use so2::{So2Sensor, Ze03So2, SO2_CONCENTRATION};
pub use tvoc::{TvocSensor, Ze40aTvoc, TVOC_PPB, TVOC_UG_M3};

use crate::config::SensorInfo;
use crate::error::SensorError;
use crate::measurement::{Clock, RuntimeMeasurement, Sample};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default wait between a command and its response
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Default deadline for frame-synchronized reads
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Capabilities every sensor model provides
#[allow(async_fn_in_trait)]
pub trait Sensor {
    /// Static configuration of this sensor
    fn info(&self) -> &SensorInfo;

    /// Activate the transport and put the device into query mode
    async fn begin(&mut self) -> Result<(), SensorError>;

    /// Request, capture, verify and decode one measurement
    async fn sample(&mut self, measurement_id: u8) -> Result<Sample, SensorError>;
}

/// Which transport family a model speaks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportClass {
    Serial,
    I2c,
}

/// Supported sensor models, keyed by configuration type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Tvoc,
    Ch2o,
    So2,
    Co2,
    Co,
    Particulate,
    Oxygen,
}

impl SensorKind {
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Tvoc,
        SensorKind::Ch2o,
        SensorKind::So2,
        SensorKind::Co2,
        SensorKind::Co,
        SensorKind::Particulate,
        SensorKind::Oxygen,
    ];

    /// Configuration type tag
    pub fn type_tag(&self) -> &'static str {
        match self {
            SensorKind::Tvoc => "TVOCSensor",
            SensorKind::Ch2o => "CH2OSensor",
            SensorKind::So2 => "SO2Sensor",
            SensorKind::Co2 => "CO2Sensor",
            SensorKind::Co => "DFRobotCOSensor",
            SensorKind::Particulate => "PMS7003Sensor",
            SensorKind::Oxygen => "DFRobotOxygenSensor",
        }
    }

    pub fn transport_class(&self) -> TransportClass {
        match self {
            SensorKind::Oxygen => TransportClass::I2c,
            _ => TransportClass::Serial,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.type_tag() == tag)
            .ok_or_else(|| tag.to_string())
    }
}

/// A constructed driver for one of the supported models
pub enum SensorDriver {
    Tvoc(TvocSensor),
    Ch2o(Ch2oSensor),
    So2(So2Sensor),
    Co2(Co2Sensor),
    Co(CoSensor),
    Particulate(Pms7003Sensor),
    Oxygen(OxygenSensor),
}

macro_rules! each_driver {
    ($driver:expr, $sensor:ident => $body:expr) => {
        match $driver {
            SensorDriver::Tvoc($sensor) => $body,
            SensorDriver::Ch2o($sensor) => $body,
            SensorDriver::So2($sensor) => $body,
            SensorDriver::Co2($sensor) => $body,
            SensorDriver::Co($sensor) => $body,
            SensorDriver::Particulate($sensor) => $body,
            SensorDriver::Oxygen($sensor) => $body,
        }
    };
}

impl SensorDriver {
    /// Wrap a transport in the driver for `kind`; the driver owns it from here on
    pub fn build(kind: SensorKind, info: Arc<SensorInfo>, transport: Transport) -> Self {
        match kind {
            SensorKind::Tvoc => SensorDriver::Tvoc(TvocSensor::new(info, transport)),
            SensorKind::Ch2o => SensorDriver::Ch2o(Ch2oSensor::new(info, transport)),
            SensorKind::So2 => SensorDriver::So2(So2Sensor::new(info, transport)),
            SensorKind::Co2 => SensorDriver::Co2(Co2Sensor::new(info, transport)),
            SensorKind::Co => SensorDriver::Co(CoSensor::new(info, transport)),
            SensorKind::Particulate => {
                SensorDriver::Particulate(Pms7003Sensor::new(info, transport))
            }
            SensorKind::Oxygen => SensorDriver::Oxygen(OxygenSensor::new(info, transport)),
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            SensorDriver::Tvoc(_) => SensorKind::Tvoc,
            SensorDriver::Ch2o(_) => SensorKind::Ch2o,
            SensorDriver::So2(_) => SensorKind::So2,
            SensorDriver::Co2(_) => SensorKind::Co2,
            SensorDriver::Co(_) => SensorKind::Co,
            SensorDriver::Particulate(_) => SensorKind::Particulate,
            SensorDriver::Oxygen(_) => SensorKind::Oxygen,
        }
    }

    pub fn info(&self) -> &SensorInfo {
        each_driver!(self, s => s.info())
    }

    pub async fn begin(&mut self) -> Result<(), SensorError> {
        each_driver!(self, s => s.begin().await)
    }

    pub async fn sample(&mut self, measurement_id: u8) -> Result<Sample, SensorError> {
        each_driver!(self, s => s.sample(measurement_id).await)
    }

    /// Decode one measurement into `slot`
    ///
    /// On success the value, timestamp and status are written. On failure
    /// only the status changes; value and timestamp keep whatever the caller
    /// initialized them to.
    pub async fn read_into<C: Clock + ?Sized>(
        &mut self,
        measurement_id: u8,
        slot: &mut RuntimeMeasurement,
        clock: &C,
    ) -> Result<(), SensorError> {
        match self.sample(measurement_id).await {
            Ok(sample) => {
                slot.record(sample, clock.now_ms());
                Ok(())
            }
            Err(e) => {
                slot.status = e.status();
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SensorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorDriver")
            .field("kind", &self.kind())
            .field("sensor_id", &self.info().sensor_id)
            .finish()
    }
}
