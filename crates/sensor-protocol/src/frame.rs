//! Wire Frame Helpers
//!
//! Two frame families are spoken by the supported sensors:
//!
//! - 9-byte command/response frames (Winsen, Dart, DFRobot UART gas sensors):
//!   byte 0 is `0xFF`, byte 8 is the two's complement of the sum of bytes 1..=7.
//! - 32-byte Plantower frames: marker `0x42 0x4D`, payload length at [2,3],
//!   16-bit big-endian sum of bytes 0..30 at [30,31].

use crate::error::SensorError;

/// Length of a Winsen-style command or response
pub const WINSEN_FRAME_LEN: usize = 9;

/// Start byte of every Winsen-style frame
pub const WINSEN_START: u8 = 0xFF;

/// Length of a Plantower data frame
pub const PMS_FRAME_LEN: usize = 32;

/// Plantower frame marker
pub const PMS_MARKER: [u8; 2] = [0x42, 0x4D];

/// Payload length declared by a Plantower data frame
pub const PMS_PAYLOAD_LEN: u16 = 28;

/// Upper bound on bytes discarded while hunting for a marker
pub const MAX_SYNC_BYTES: usize = 256;

/// Winsen checksum over bytes 1..=7
pub fn winsen_checksum(frame: &[u8; WINSEN_FRAME_LEN]) -> u8 {
    let sum = frame[1..8].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

/// Build a 9-byte command with a valid trailing checksum
pub const fn winsen_command(command: u8, args: [u8; 5]) -> [u8; WINSEN_FRAME_LEN] {
    let mut frame = [
        WINSEN_START,
        0x01,
        command,
        args[0],
        args[1],
        args[2],
        args[3],
        args[4],
        0,
    ];
    let mut sum = 0u8;
    let mut i = 1;
    while i < 8 {
        sum = sum.wrapping_add(frame[i]);
        i += 1;
    }
    frame[8] = (!sum).wrapping_add(1);
    frame
}

/// Check start byte and checksum of a 9-byte response
pub fn verify_winsen(frame: &[u8; WINSEN_FRAME_LEN]) -> Result<(), SensorError> {
    if frame[0] != WINSEN_START {
        return Err(SensorError::Malformed(format!(
            "expected start byte 0xFF, got 0x{:02X}",
            frame[0]
        )));
    }
    let expected = winsen_checksum(frame);
    if expected != frame[8] {
        return Err(SensorError::ChecksumMismatch {
            expected: expected as u16,
            actual: frame[8] as u16,
        });
    }
    Ok(())
}

/// 16-bit wrapping sum of every byte before the trailing checksum
pub fn pms_checksum(frame: &[u8]) -> u16 {
    let body = &frame[..frame.len().saturating_sub(2)];
    body.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Build a 7-byte Plantower command with a valid checksum
pub const fn pms_command(command: u8, data: u16) -> [u8; 7] {
    let data_hi = (data >> 8) as u8;
    let data_lo = data as u8;
    let sum = PMS_MARKER[0] as u16
        + PMS_MARKER[1] as u16
        + command as u16
        + data_hi as u16
        + data_lo as u16;
    [
        PMS_MARKER[0],
        PMS_MARKER[1],
        command,
        data_hi,
        data_lo,
        (sum >> 8) as u8,
        sum as u8,
    ]
}

/// Check marker, declared length and checksum of a 32-byte frame
pub fn verify_pms(frame: &[u8; PMS_FRAME_LEN]) -> Result<(), SensorError> {
    if frame[..2] != PMS_MARKER {
        return Err(SensorError::Malformed(format!(
            "expected marker 42 4D, got {:02X} {:02X}",
            frame[0], frame[1]
        )));
    }
    let declared = read_u16_be(frame, 2);
    if declared != PMS_PAYLOAD_LEN {
        return Err(SensorError::Malformed(format!(
            "declared payload length {} (expected {})",
            declared, PMS_PAYLOAD_LEN
        )));
    }
    let actual = read_u16_be(frame, PMS_FRAME_LEN - 2);
    let expected = pms_checksum(frame);
    if expected != actual {
        return Err(SensorError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Big-endian u16 at `offset`
pub fn read_u16_be(frame: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

/// Byte-at-a-time scanner for a two-byte frame marker
///
/// Handles overlapping prefixes, so `42 42 4D` aligns on the second `42`.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    marker: [u8; 2],
    previous: Option<u8>,
    consumed: usize,
}

impl MarkerScanner {
    pub fn new(marker: [u8; 2]) -> Self {
        Self {
            marker,
            previous: None,
            consumed: 0,
        }
    }

    /// Feed one byte; returns true once the marker has been seen
    pub fn feed(&mut self, byte: u8) -> bool {
        self.consumed += 1;
        let matched = self.previous == Some(self.marker[0]) && byte == self.marker[1];
        self.previous = Some(byte);
        matched
    }

    /// Bytes consumed so far, marker included
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes discarded ahead of the marker, valid once `feed` returned true
    pub fn discarded(&self) -> usize {
        self.consumed.saturating_sub(2)
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.consumed = 0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A valid PMS7003 frame with distinct field values
    pub(crate) fn reference_pms_frame() -> [u8; PMS_FRAME_LEN] {
        let mut frame = [0u8; PMS_FRAME_LEN];
        frame[0] = 0x42;
        frame[1] = 0x4D;
        frame[2] = 0x00;
        frame[3] = 0x1C;
        for field in 0..13u16 {
            let value = 10 * (field + 1) + (field << 8);
            let offset = 4 + 2 * field as usize;
            frame[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        }
        let sum = pms_checksum(&frame);
        frame[30..32].copy_from_slice(&sum.to_be_bytes());
        frame
    }

    /// A valid 9-byte response with the given payload
    pub(crate) fn winsen_response(payload: [u8; 7]) -> [u8; WINSEN_FRAME_LEN] {
        let mut frame = [0u8; WINSEN_FRAME_LEN];
        frame[0] = WINSEN_START;
        frame[1..8].copy_from_slice(&payload);
        frame[8] = winsen_checksum(&frame);
        frame
    }

    #[test]
    fn test_winsen_command_constants() {
        assert_eq!(
            winsen_command(0x86, [0; 5]),
            [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79]
        );
        assert_eq!(
            winsen_command(0x78, [0x41, 0, 0, 0, 0]),
            [0xFF, 0x01, 0x78, 0x41, 0x00, 0x00, 0x00, 0x00, 0x46]
        );
        assert_eq!(winsen_command(0x78, [0x04, 0, 0, 0, 0])[8], 0x83);
        assert_eq!(winsen_command(0x78, [0x03, 0, 0, 0, 0])[8], 0x84);
    }

    #[test]
    fn test_pms_command_constants() {
        assert_eq!(pms_command(0xE1, 0x0000), [0x42, 0x4D, 0xE1, 0x00, 0x00, 0x01, 0x70]);
        assert_eq!(pms_command(0xE2, 0x0000), [0x42, 0x4D, 0xE2, 0x00, 0x00, 0x01, 0x71]);
    }

    #[test]
    fn test_ch2o_reference_response() {
        let frame = [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x01, 0x2C, 0x4C];
        assert!(verify_winsen(&frame).is_ok());
        assert_eq!(read_u16_be(&frame, 6), 300);
    }

    #[test]
    fn test_winsen_rejects_bad_start() {
        let mut frame = winsen_response([0x86, 0, 0x20, 0, 0, 0, 0]);
        frame[0] = 0xFE;
        assert!(matches!(verify_winsen(&frame), Err(SensorError::Malformed(_))));
    }

    #[test]
    fn test_pms_reference_frame_passes() {
        assert!(verify_pms(&reference_pms_frame()).is_ok());
    }

    #[test]
    fn test_pms_wrong_length_is_malformed() {
        let mut frame = reference_pms_frame();
        frame[3] = 0x14;
        let sum = pms_checksum(&frame);
        frame[30..32].copy_from_slice(&sum.to_be_bytes());
        assert!(matches!(verify_pms(&frame), Err(SensorError::Malformed(_))));
    }

    #[test]
    fn test_scanner_overlapping_prefix() {
        let mut scanner = MarkerScanner::new(PMS_MARKER);
        let stream = [0x42, 0x42, 0x4D];
        let hit = stream.iter().position(|&b| scanner.feed(b));
        assert_eq!(hit, Some(2));
        assert_eq!(scanner.discarded(), 1);
    }

    #[test]
    fn test_scanner_discards_exact_garbage() {
        for k in [0usize, 1, 5, 31] {
            let mut stream: Vec<u8> = (0..k).map(|i| (i as u8).wrapping_mul(7) | 0x01).collect();
            stream.extend_from_slice(&reference_pms_frame());
            let mut scanner = MarkerScanner::new(PMS_MARKER);
            let hit = stream.iter().position(|&b| scanner.feed(b));
            assert_eq!(hit, Some(k + 1), "garbage length {}", k);
            assert_eq!(scanner.discarded(), k);
        }
    }

    proptest! {
        #[test]
        fn prop_pms_single_bit_flip_fails(byte in 0usize..30, bit in 0u8..8) {
            let mut frame = reference_pms_frame();
            frame[byte] ^= 1 << bit;
            prop_assert!(verify_pms(&frame).is_err());
        }

        #[test]
        fn prop_winsen_single_bit_flip_fails(
            payload in proptest::array::uniform7(any::<u8>()),
            byte in 1usize..8,
            bit in 0u8..8,
        ) {
            let mut frame = winsen_response(payload);
            prop_assert!(verify_winsen(&frame).is_ok());
            frame[byte] ^= 1 << bit;
            prop_assert!(verify_winsen(&frame).is_err());
        }
    }
}
