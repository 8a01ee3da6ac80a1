//! Winsen ZE40A-TVOC
//!
//! Streams once per second after power-up; switched to query mode in `begin`.
//! Response: `FF 86 [ug/m3 hi] [ug/m3 lo] 00 00 [ppb hi] [ppb lo] CS`.

use super::query::{Field, QueryModel, QuerySensor};
use crate::frame::{winsen_command, WINSEN_FRAME_LEN};

/// TVOC concentration (ppb)
pub const TVOC_PPB: u8 = 1;
/// TVOC concentration (ug/m3)
pub const TVOC_UG_M3: u8 = 2;

pub struct Ze40aTvoc;

impl QueryModel for Ze40aTvoc {
    const MODEL: &'static str = "ZE40A-TVOC";
    const ACTIVATION: Option<[u8; WINSEN_FRAME_LEN]> = Some(winsen_command(0x78, [0x41, 0, 0, 0, 0]));

    fn field(measurement_id: u8) -> Option<Field> {
        match measurement_id {
            TVOC_PPB => Some(Field::U16Be(6)),
            TVOC_UG_M3 => Some(Field::U16Be(2)),
            _ => None,
        }
    }
}

pub type TvocSensor = QuerySensor<Ze40aTvoc>;
