//! Status and sensor frames sent by the device.
//!
//! Layout of the status frame answering `AP`:
//!
//! ```text
//! +-----+-----+-----+----+----+----+----+-----+-----+
//! | STX | 'A' | 'P' | h3 | h2 | h1 | h0 | ETX | BCC |
//! +-----+-----+-----+----+----+----+----+-----+-----+
//! ```
//!
//! The four hex digits hold the 16-bit flag field, most significant nibble
//! first. Only the length and the BCC are validated before the field is
//! parsed; the marker bytes are covered by the BCC.
//!
//! The sensor frame answering `RF` has the same shape with three hex digits
//! and `'S' 'F'` as its marker.

use dispenser_core::{Error, Result, constants::*};

use crate::checksum;
use crate::flags::StatusFlags;

/// Decode a 9-byte status frame into its flag set.
///
/// # Errors
/// `Error::InvalidFrameLength` unless the frame is exactly 9 bytes,
/// `Error::ChecksumMismatch` when byte 8 is not the XOR of bytes 0 to 7 and
/// `Error::InvalidStatusField` when bytes 3 to 6 are not hex digits.
pub fn decode_status(frame: &[u8]) -> Result<StatusFlags> {
    if frame.len() != STATUS_FRAME_LEN {
        return Err(Error::InvalidFrameLength {
            expected: STATUS_FRAME_LEN,
            actual: frame.len(),
        });
    }
    checksum::verify(frame)?;

    let field = &frame[STATUS_FIELD_OFFSET..STATUS_FIELD_OFFSET + STATUS_FIELD_DIGITS];
    parse_hex_field(field).map(StatusFlags::from_bits)
}

/// Decode an 8-byte sensor frame into the low 12 bits of a flag set.
///
/// # Errors
/// Same as [`decode_status`], plus `Error::InvalidStatusField` when the
/// marker is not `SF`.
pub fn decode_sensor(frame: &[u8]) -> Result<StatusFlags> {
    if frame.len() != SENSOR_FRAME_LEN {
        return Err(Error::InvalidFrameLength {
            expected: SENSOR_FRAME_LEN,
            actual: frame.len(),
        });
    }
    checksum::verify(frame)?;

    if frame[1..3] != OP_SENSOR_REPLY {
        return Err(Error::InvalidStatusField(format!(
            "unexpected sensor marker {:02X} {:02X}",
            frame[1], frame[2]
        )));
    }

    let field = &frame[SENSOR_FIELD_OFFSET..SENSOR_FIELD_OFFSET + SENSOR_FIELD_DIGITS];
    parse_hex_field(field).map(StatusFlags::from_bits)
}

/// Four uppercase hex digits of `flags`, most significant nibble first.
pub fn encode_status_field(flags: StatusFlags) -> [u8; STATUS_FIELD_DIGITS] {
    let bits = flags.bits();
    [
        hex_digit(bits >> 12),
        hex_digit(bits >> 8),
        hex_digit(bits >> 4),
        hex_digit(bits),
    ]
}

/// Build the status frame the device would send for `flags`.
pub fn status_frame(flags: StatusFlags) -> [u8; STATUS_FRAME_LEN] {
    let mut frame = [0u8; STATUS_FRAME_LEN];
    frame[0] = STX;
    frame[1..3].copy_from_slice(&OP_STATUS_CHECK);
    frame[STATUS_FIELD_OFFSET..STATUS_FIELD_OFFSET + STATUS_FIELD_DIGITS]
        .copy_from_slice(&encode_status_field(flags));
    frame[7] = ETX;
    frame[8] = checksum::bcc(&frame[..8]);
    frame
}

/// Build the sensor frame the device would send for `flags`.
///
/// Bits above the low 12 are not representable and are dropped.
pub fn sensor_frame(flags: StatusFlags) -> [u8; SENSOR_FRAME_LEN] {
    let bits = flags.bits();
    let mut frame = [0u8; SENSOR_FRAME_LEN];
    frame[0] = STX;
    frame[1..3].copy_from_slice(&OP_SENSOR_REPLY);
    frame[3] = hex_digit(bits >> 8);
    frame[4] = hex_digit(bits >> 4);
    frame[5] = hex_digit(bits);
    frame[6] = ETX;
    frame[7] = checksum::bcc(&frame[..7]);
    frame
}

fn parse_hex_field(digits: &[u8]) -> Result<u16> {
    digits.iter().try_fold(0u16, |acc, &digit| {
        let nibble = (digit as char).to_digit(16).ok_or_else(|| {
            Error::InvalidStatusField(format!("non-hex digit {digit:#04X} in status field"))
        })?;
        Ok((acc << 4) | nibble as u16)
    })
}

fn hex_digit(value: u16) -> u8 {
    b"0123456789ABCDEF"[(value & 0x0F) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::StatusFlag;
    use rstest::rstest;

    fn with_bcc(payload: &[u8]) -> Vec<u8> {
        let mut frame = payload.to_vec();
        frame.push(checksum::bcc(payload));
        frame
    }

    #[test]
    fn test_decode_capture_sensor_frame() {
        let frame = with_bcc(&[0x02, 0x41, 0x50, 0x30, 0x30, 0x30, 0x31, 0x33]);
        assert_eq!(frame[8], 0x21);

        let flags = decode_status(&frame).unwrap();
        assert_eq!(flags.bits(), 0x0001);
        assert!(flags.contains(StatusFlag::CaptureSensor1));
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut frame = status_frame(StatusFlag::Jam.into());
        frame[8] ^= 0xFF;

        let err = decode_status(&frame).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(err.is_frame_error());
    }

    #[rstest]
    #[case(0)]
    #[case(8)]
    #[case(10)]
    fn test_decode_rejects_wrong_length(#[case] len: usize) {
        let frame = vec![0x30; len];
        assert!(matches!(
            decode_status(&frame),
            Err(Error::InvalidFrameLength { expected: 9, actual }) if actual == len
        ));
    }

    #[rstest]
    #[case(b"2000", 0x2000)]
    #[case(b"3FFF", 0x3FFF)]
    #[case(b"0a1b", 0x0A1B)]
    #[case(b"0010", 0x0010)]
    fn test_decode_field_values(#[case] digits: &[u8; 4], #[case] expected: u16) {
        let mut payload = vec![STX, b'A', b'P'];
        payload.extend_from_slice(digits);
        payload.push(ETX);
        let frame = with_bcc(&payload);

        assert_eq!(decode_status(&frame).unwrap().bits(), expected);
    }

    #[test]
    fn test_decode_rejects_non_hex_field() {
        let frame = with_bcc(&[STX, b'A', b'P', b'+', b'0', b'0', b'1', ETX]);
        assert!(matches!(
            decode_status(&frame),
            Err(Error::InvalidStatusField(_))
        ));
    }

    #[test]
    fn test_status_frame_layout() {
        let frame = status_frame(StatusFlag::BinFull | StatusFlag::CardEmpty);
        assert_eq!(&frame[..8], &[STX, b'A', b'P', b'1', b'0', b'0', b'8', ETX]);
        assert_eq!(frame[8], checksum::bcc(&frame[..8]));
    }

    #[test]
    fn test_sensor_frame_round_trip() {
        let flags = StatusFlag::DispenseSensor | StatusFlag::CardPreEmpty;
        let frame = sensor_frame(flags);
        assert_eq!(&frame[..7], &[STX, b'S', b'F', b'0', b'1', b'4', ETX]);
        assert_eq!(decode_sensor(&frame).unwrap(), flags);
    }

    #[test]
    fn test_sensor_frame_without_bcc_is_short() {
        let frame = sensor_frame(StatusFlag::CaptureSensor1.into());
        assert_eq!(frame.len(), 8);
        assert_eq!(frame[7], 0x25);
        assert!(matches!(
            decode_sensor(&frame[..7]),
            Err(Error::InvalidFrameLength {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_sensor_frame_drops_high_bits() {
        let frame = sensor_frame(StatusFlag::SensorInvalid | StatusFlag::Jam);
        assert_eq!(decode_sensor(&frame).unwrap().bits(), 0x0020);
    }

    #[test]
    fn test_decode_sensor_rejects_status_marker() {
        let frame = with_bcc(&[STX, b'A', b'P', b'0', b'0', b'1', ETX]);
        assert!(matches!(
            decode_sensor(&frame),
            Err(Error::InvalidStatusField(_))
        ));
    }

    #[test]
    fn test_decode_sensor_rejects_bad_checksum() {
        let mut frame = sensor_frame(StatusFlags::empty());
        frame[4] = b'7';
        assert!(matches!(
            decode_sensor(&frame),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
