//! Measurement Report Lines
//!
//! Each poll pass is written to stdout one slot per line for the uplink
//! script on the gateway.

use crate::settings::{ReportConfig, ReportFormat};
use sensor_protocol::RuntimeMeasurement;
use std::io::{self, Write};

/// Render one slot in the configured format
pub fn format_line(m: &RuntimeMeasurement, format: ReportFormat) -> io::Result<String> {
    match format {
        ReportFormat::Text => Ok(format!(
            "sensor={}, measurement={}, value={:.2}, ts={}",
            m.sensor_id, m.measurement_id, m.value, m.timestamp_ms
        )),
        ReportFormat::Json => serde_json::to_string(m).map_err(io::Error::from),
    }
}

/// Write the given slots; returns how many lines were emitted
pub fn write_report<'a, W, I>(out: &mut W, slots: I, config: &ReportConfig) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a RuntimeMeasurement>,
{
    let mut lines = 0;
    for m in slots {
        if config.valid_only && !m.is_valid() {
            continue;
        }
        writeln!(out, "{}", format_line(m, config.format)?)?;
        lines += 1;
    }
    out.flush()?;
    Ok(lines)
}
