//! Block check character (BCC) used by every frame of the protocol.

use dispenser_core::{Error, Result};

/// XOR of every byte in `bytes`.
///
/// Command frames compute it over STX, the opcode, the optional position
/// byte and ETX; status frames over their first eight bytes.
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Verify that the last byte of `frame` is the BCC of the bytes before it.
///
/// # Errors
/// Returns `Error::InvalidFrameLength` for an empty frame and
/// `Error::ChecksumMismatch` when the check byte does not match.
pub fn verify(frame: &[u8]) -> Result<()> {
    let Some((&actual, payload)) = frame.split_last() else {
        return Err(Error::InvalidFrameLength {
            expected: 1,
            actual: 0,
        });
    };

    let expected = bcc(payload);
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
