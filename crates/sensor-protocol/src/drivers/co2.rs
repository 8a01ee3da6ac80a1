//! Winsen MH-Z19C NDIR CO2 Sensor
//!
//! Answers queries out of the box; no mode switch needed.

use super::query::{Field, QueryModel, QuerySensor};
use crate::frame::WINSEN_FRAME_LEN;

/// CO2 concentration (ppm)
pub const CO2_PPM: u8 = 1;

pub struct Mhz19c;

impl QueryModel for Mhz19c {
    const MODEL: &'static str = "MH-Z19C";
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]> = None;

    fn field(measurement_id: u8) -> Option<Field> {
        (measurement_id == CO2_PPM).then_some(Field::U16Be(2))
    }
}

pub type Co2Sensor = QuerySensor<Mhz19c>;
