//! DFRobot Gas Sensor (UART), CO Probe
//!
//! Response: `FF 86 [conc hi] [conc lo] [gas type] [decimals] [temp hi] [temp lo] CS`.
//! The concentration is scaled by the decimal-places byte.

use super::query::{Field, QueryModel, QuerySensor};
use crate::frame::{winsen_command, WINSEN_FRAME_LEN};

/// CO concentration (ppm)
pub const CO_PPM: u8 = 1;

pub struct DfRobotGasCo;

impl QueryModel for DfRobotGasCo {
    const MODEL: &'static str = "DFRobot Gas (CO)";
    // Passive acquisition mode
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]> = Some(winsen_command(0x78, [0x04, 0, 0, 0, 0]));

    fn field(measurement_id: u8) -> Option<Field> {
        (measurement_id == CO_PPM).then_some(Field::Scaled {
            offset: 2,
            decimals_at: 5,
        })
    }
}

pub type CoSensor = QuerySensor<DfRobotGasCo>;
