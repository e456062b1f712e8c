//! Common helpers for protocol integration tests.
//!
//! Frames are built from literal bytes here rather than through the codec,
//! so a test failure points at the codec instead of at the fixture.

#![allow(dead_code)]

use dispenser_protocol::bcc;

/// Bytes of a status frame for a raw 4-digit field, BCC appended.
pub fn raw_status_frame(field: &[u8; 4]) -> Vec<u8> {
    let mut frame = vec![0x02, b'A', b'P'];
    frame.extend_from_slice(field);
    frame.push(0x03);
    frame.push(bcc(&frame));
    frame
}

/// Uppercase hex digits of `bits`, most significant first.
pub fn field_digits(bits: u16) -> [u8; 4] {
    let text = format!("{bits:04X}");
    let mut digits = [0u8; 4];
    digits.copy_from_slice(text.as_bytes());
    digits
}
