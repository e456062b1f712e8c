//! Outbound commands and their wire encoding.
//!
//! Every command is a two-character opcode with an optional position byte.
//! The frame is built on demand by [`Command::encode`], so the block check
//! character can never drift from the payload it covers.

use bytes::{BufMut, Bytes, BytesMut};
use dispenser_core::{Error, Result, constants::*};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checksum;

/// What the device does with a card inserted from the front or captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePolicy {
    /// Refuse inserted cards.
    Prohibit,
    /// Route inserted or captured cards to the error bin.
    ErrorBin,
    /// Stop inserted cards at the reader.
    Read,
}

impl CapturePolicy {
    /// Position byte carried by the `IN` command.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Prohibit => POLICY_PROHIBIT,
            Self::ErrorBin => POLICY_ERROR_BIN,
            Self::Read => POLICY_READ,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            POLICY_PROHIBIT => Some(Self::Prohibit),
            POLICY_ERROR_BIN => Some(Self::ErrorBin),
            POLICY_READ => Some(Self::Read),
            _ => None,
        }
    }
}

/// Where a card taken from the stacker is moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispensePosition {
    /// Push the card out of the front.
    Spit,
    /// Hold the card at the reader.
    Read,
    /// Hold the card at the exit for the customer to take.
    Exit,
}

impl DispensePosition {
    /// Position byte carried by the `FC` command.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Spit => POSITION_SPIT,
            Self::Read => POSITION_READ,
            Self::Exit => POSITION_EXIT,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            POSITION_SPIT => Some(Self::Spit),
            POSITION_READ => Some(Self::Read),
            POSITION_EXIT => Some(Self::Exit),
            _ => None,
        }
    }
}

/// A command the host can send to the dispenser.
///
/// # Wire Format
///
/// ```text
/// StatusCheck                 02 41 50 03 10
/// Dispense(Exit)              02 46 43 34 03 30
/// SetCapturePolicy(Prohibit)  02 49 4E 30 03 36
/// ```
///
/// # Examples
///
/// ```
/// use dispenser_protocol::{CapturePolicy, Command};
///
/// let cmd = Command::SetCapturePolicy(CapturePolicy::Read);
/// assert_eq!(cmd.opcode(), *b"IN");
/// assert_eq!(cmd.position(), Some(0x32));
///
/// let bytes = cmd.encode();
/// assert_eq!(bytes.len(), 6);
/// assert_eq!(Command::parse(&bytes).unwrap(), cmd);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// `AP`: full status check, answered by a 9-byte status frame.
    StatusCheck,
    /// `RF`: sensor check, answered by an 8-byte sensor frame.
    SensorCheck,
    /// `RS`: reset the mechanism.
    Reset,
    /// `CP`: capture the card to the destination set by the capture policy.
    Capture,
    /// `FC`: move a card from the stacker to a position.
    Dispense(DispensePosition),
    /// `IN`: choose what happens to inserted cards.
    SetCapturePolicy(CapturePolicy),
}

impl Command {
    /// Two-character operation code.
    pub const fn opcode(&self) -> [u8; 2] {
        match self {
            Self::StatusCheck => OP_STATUS_CHECK,
            Self::SensorCheck => OP_SENSOR_CHECK,
            Self::Reset => OP_RESET,
            Self::Capture => OP_CAPTURE,
            Self::Dispense(_) => OP_DISPENSE,
            Self::SetCapturePolicy(_) => OP_CAPTURE_POLICY,
        }
    }

    /// Position byte for positional commands.
    pub const fn position(&self) -> Option<u8> {
        match self {
            Self::Dispense(position) => Some(position.as_byte()),
            Self::SetCapturePolicy(policy) => Some(policy.as_byte()),
            _ => None,
        }
    }

    /// Whether the device answers this command with a status frame.
    pub const fn is_status_check(&self) -> bool {
        matches!(self, Self::StatusCheck)
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    pub const fn encoded_len(&self) -> usize {
        if self.position().is_some() {
            POSITIONAL_COMMAND_LEN
        } else {
            SIMPLE_COMMAND_LEN
        }
    }

    /// Frame the command for transmission.
    ///
    /// The trailing BCC is the XOR of every preceding byte, position included.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(STX);
        buf.put_slice(&self.opcode());
        if let Some(position) = self.position() {
            buf.put_u8(position);
        }
        buf.put_u8(ETX);

        let check = checksum::bcc(&buf);
        buf.put_u8(check);
        buf.freeze()
    }

    /// Parse a framed command back into its variant.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrameLength` for a frame that is neither 5 nor 6
    /// bytes, `Error::ChecksumMismatch` for a bad BCC and
    /// `Error::InvalidCommand` for missing markers or an unknown
    /// opcode/position combination.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() != SIMPLE_COMMAND_LEN && frame.len() != POSITIONAL_COMMAND_LEN {
            return Err(Error::InvalidFrameLength {
                expected: SIMPLE_COMMAND_LEN,
                actual: frame.len(),
            });
        }
        if frame[0] != STX || frame[frame.len() - 2] != ETX {
            return Err(Error::InvalidCommand(format!(
                "missing STX/ETX markers in {}",
                hex(frame)
            )));
        }
        checksum::verify(frame)?;

        let opcode = [frame[1], frame[2]];
        let position = (frame.len() == POSITIONAL_COMMAND_LEN).then(|| frame[3]);

        let command = match (opcode, position) {
            (OP_STATUS_CHECK, None) => Some(Self::StatusCheck),
            (OP_SENSOR_CHECK, None) => Some(Self::SensorCheck),
            (OP_RESET, None) => Some(Self::Reset),
            (OP_CAPTURE, None) => Some(Self::Capture),
            (OP_DISPENSE, Some(byte)) => DispensePosition::from_byte(byte).map(Self::Dispense),
            (OP_CAPTURE_POLICY, Some(byte)) => {
                CapturePolicy::from_byte(byte).map(Self::SetCapturePolicy)
            }
            _ => None,
        };

        command.ok_or_else(|| Error::InvalidCommand(format!("unknown command {}", hex(frame))))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispense(position) => write!(f, "Dispense({position:?})"),
            Self::SetCapturePolicy(policy) => write!(f, "SetCapturePolicy({policy:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Space-separated uppercase hex dump used in logs and error messages.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::status(Command::StatusCheck, &[0x02, 0x41, 0x50, 0x03, 0x10])]
    #[case::reset(Command::Reset, &[0x02, 0x52, 0x53, 0x03, 0x00])]
    #[case::capture(Command::Capture, &[0x02, 0x43, 0x50, 0x03, 0x12])]
    #[case::sensor(Command::SensorCheck, &[0x02, 0x52, 0x46, 0x03, 0x15])]
    #[case::exit(Command::Dispense(DispensePosition::Exit), &[0x02, 0x46, 0x43, 0x34, 0x03, 0x30])]
    #[case::read(Command::Dispense(DispensePosition::Read), &[0x02, 0x46, 0x43, 0x33, 0x03, 0x37])]
    #[case::spit(Command::Dispense(DispensePosition::Spit), &[0x02, 0x46, 0x43, 0x30, 0x03, 0x34])]
    #[case::prohibit(Command::SetCapturePolicy(CapturePolicy::Prohibit), &[0x02, 0x49, 0x4E, 0x30, 0x03, 0x36])]
    #[case::error_bin(Command::SetCapturePolicy(CapturePolicy::ErrorBin), &[0x02, 0x49, 0x4E, 0x31, 0x03, 0x37])]
    #[case::read_policy(Command::SetCapturePolicy(CapturePolicy::Read), &[0x02, 0x49, 0x4E, 0x32, 0x03, 0x34])]
    fn test_encode_matches_device_frames(#[case] command: Command, #[case] expected: &[u8]) {
        assert_eq!(&command.encode()[..], expected);
        assert_eq!(command.encoded_len(), expected.len());
    }

    #[test]
    fn test_checksum_covers_position_byte() {
        let spit = Command::Dispense(DispensePosition::Spit).encode();
        let exit = Command::Dispense(DispensePosition::Exit).encode();
        assert_ne!(spit[5], exit[5]);
        assert_eq!(spit[5] ^ exit[5], POSITION_SPIT ^ POSITION_EXIT);
    }

    #[test]
    fn test_only_status_check_expects_status() {
        assert!(Command::StatusCheck.is_status_check());
        assert!(!Command::SensorCheck.is_status_check());
        assert!(!Command::Dispense(DispensePosition::Read).is_status_check());
    }

    #[test]
    fn test_parse_rejects_unknown_position() {
        let mut frame = vec![STX, b'F', b'C', 0x39, ETX];
        frame.push(checksum::bcc(&frame));
        assert!(matches!(
            Command::parse(&frame),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut frame = Command::Reset.encode().to_vec();
        frame[4] ^= 0x01;
        assert!(matches!(
            Command::parse(&frame),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_status_frame() {
        assert!(matches!(
            Command::parse(&[0u8; 9]),
            Err(Error::InvalidFrameLength { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::StatusCheck.to_string(), "StatusCheck");
        assert_eq!(
            Command::SetCapturePolicy(CapturePolicy::ErrorBin).to_string(),
            "SetCapturePolicy(ErrorBin)"
        );
        assert_eq!(hex(&Command::Reset.encode()), "02 52 53 03 00");
    }
}
