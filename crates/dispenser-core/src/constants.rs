//! Core constants for the card dispenser protocol.
//!
//! This module defines the protocol-level bytes, frame sizes, position
//! parameters and timing defaults used throughout the workspace. Keeping them
//! in one place ensures the codec, the transport mock and the link loop agree
//! on the wire format.
//!
//! # Protocol Structure
//!
//! Commands are short ASCII frames closed by an XOR block check character:
//!
//! ```text
//! <STX> OP0 OP1 <ETX> <BCC>          simple command
//! <STX> OP0 OP1 POS <ETX> <BCC>      positional command
//! ```
//!
//! After every command the device answers with a single `ACK` byte, which the
//! host confirms with `ENQ`. A status check is then followed by a 9-byte status
//! frame:
//!
//! ```text
//! <STX> 'A' 'P' H H H H <b7> <BCC>
//!               ^^^^^^^
//!               16-bit flag field, 4 ASCII hex digits, big-endian
//! ```
//!
//! # Usage
//!
//! ```
//! use dispenser_core::constants::*;
//!
//! assert_eq!(STATUS_FRAME_LEN, 9);
//! assert_eq!(ACK, 0x06);
//!
//! use std::time::Duration;
//! let tick = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);
//! assert_eq!(tick.as_millis(), 200);
//! ```

// ============================================================================
// Framing Bytes
// ============================================================================

/// Start of text marker opening every frame.
pub const STX: u8 = 0x02;

/// End of text marker closing the payload of every command frame.
pub const ETX: u8 = 0x03;

/// Enquiry byte the host echoes after receiving an acknowledgement.
pub const ENQ: u8 = 0x05;

/// Acknowledgement byte the device sends after accepting a command.
pub const ACK: u8 = 0x06;

// ============================================================================
// Frame Sizes
// ============================================================================

/// Length of a simple command frame (STX, two opcode bytes, ETX, BCC).
pub const SIMPLE_COMMAND_LEN: usize = 5;

/// Length of a positional command frame (simple frame plus one position byte).
pub const POSITIONAL_COMMAND_LEN: usize = 6;

/// Length of the status frame answering an `AP` status check.
pub const STATUS_FRAME_LEN: usize = 9;

/// Offset of the first hex digit of the status flag field.
pub const STATUS_FIELD_OFFSET: usize = 3;

/// Number of hex digits in the status flag field.
pub const STATUS_FIELD_DIGITS: usize = 4;

/// Length of the short sensor frame answering an `RF` sensor check.
pub const SENSOR_FRAME_LEN: usize = 8;

/// Offset of the first hex digit of the sensor flag field.
pub const SENSOR_FIELD_OFFSET: usize = 3;

/// Number of hex digits in the sensor flag field.
pub const SENSOR_FIELD_DIGITS: usize = 3;

// ============================================================================
// Operation Codes
// ============================================================================

/// Status check (`AP`), answered by a 9-byte status frame.
pub const OP_STATUS_CHECK: [u8; 2] = *b"AP";

/// Sensor check (`RF`), answered by a 7-byte sensor frame.
pub const OP_SENSOR_CHECK: [u8; 2] = *b"RF";

/// Device reset (`RS`).
pub const OP_RESET: [u8; 2] = *b"RS";

/// Capture the card to the destination chosen by the capture policy (`CP`).
pub const OP_CAPTURE: [u8; 2] = *b"CP";

/// Move a card from the stacker to a position (`FC` + position).
pub const OP_DISPENSE: [u8; 2] = *b"FC";

/// Set the capture policy for inserted cards (`IN` + policy).
pub const OP_CAPTURE_POLICY: [u8; 2] = *b"IN";

/// Opcode the device echoes in a short sensor frame.
pub const OP_SENSOR_REPLY: [u8; 2] = *b"SF";

// ============================================================================
// Position Parameters
// ============================================================================

/// Dispense position: push the card out of the front (spit).
pub const POSITION_SPIT: u8 = 0x30;

/// Dispense position: hold the card at the reader.
pub const POSITION_READ: u8 = 0x33;

/// Dispense position: hold the card at the exit for the customer to take.
pub const POSITION_EXIT: u8 = 0x34;

/// Capture policy: refuse inserted cards.
pub const POLICY_PROHIBIT: u8 = 0x30;

/// Capture policy: route inserted or captured cards to the error bin.
pub const POLICY_ERROR_BIN: u8 = 0x31;

/// Capture policy: stop inserted cards at the reader.
pub const POLICY_READ: u8 = 0x32;

// ============================================================================
// Timing Defaults (milliseconds)
// ============================================================================

/// Sleep between two cycles of the link loop.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;

/// Sleep after a failed cycle before the link is reopened.
pub const DEFAULT_BACKOFF_INTERVAL_MS: u64 = 5_000;

/// Settle delay after echoing ENQ in the normal command cycle.
pub const DEFAULT_ACK_SETTLE_MS: u64 = 50;

/// Delay between sending a recovery command and draining its ACK byte.
pub const DEFAULT_RECOVERY_ACK_DELAY_MS: u64 = 100;

/// Settle delay after a reset or capture step of a recovery sequence.
pub const DEFAULT_RECOVERY_SETTLE_MS: u64 = 1_000;

/// Settle delay after the prohibit-capture step.
pub const DEFAULT_PROHIBIT_SETTLE_MS: u64 = 100;

/// Maximum wait for a complete status frame after a status check.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2_000;

/// Maximum time a dispensed card may wait at the exit before recapture.
pub const DEFAULT_TAKE_WAIT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Serial Defaults
// ============================================================================

/// Default serial port name.
pub const DEFAULT_PORT_NAME: &str = "COM1";

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9_600;

/// Default read/write timeout of the serial port.
pub const DEFAULT_READ_WRITE_TIMEOUT_MS: u64 = 1_000;
