//! Wire protocol of the motorized card dispenser.
//!
//! The codec is stateless: [`Command::encode`] frames an outbound command and
//! [`decode_status`] validates and parses the 9-byte status frame the device
//! sends after a status check. Checksum verification is mandatory, so a frame
//! with a bad block check character never reaches the flag decoder.
//!
//! ```
//! use dispenser_protocol::{Command, DispensePosition, StatusFlag, decode_status, status_frame};
//!
//! let bytes = Command::Dispense(DispensePosition::Exit).encode();
//! assert_eq!(&bytes[..], &[0x02, b'F', b'C', 0x34, 0x03, 0x02 ^ b'F' ^ b'C' ^ 0x34 ^ 0x03]);
//!
//! let frame = status_frame(StatusFlag::CaptureSensor1.into());
//! let flags = decode_status(&frame).unwrap();
//! assert!(flags.contains(StatusFlag::CaptureSensor1));
//! ```

pub mod checksum;
pub mod command;
pub mod flags;
pub mod status;

pub use checksum::bcc;
pub use command::{CapturePolicy, Command, DispensePosition};
pub use flags::{StatusFlag, StatusFlags};
pub use status::{
    decode_sensor, decode_status, encode_status_field, sensor_frame, status_frame,
};
