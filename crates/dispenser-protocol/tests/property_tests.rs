//! Property-based tests for the frame codec.
//!
//! The checksum is the only integrity check the device offers, so these
//! properties pin down that every single-byte corruption is caught and that
//! every representable flag field survives the frame unchanged.

mod common;

use dispenser_core::Error;
use dispenser_protocol::{
    CapturePolicy, Command, DispensePosition, StatusFlags, decode_status, status_frame,
};
use proptest::prelude::*;

fn any_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::StatusCheck),
        Just(Command::SensorCheck),
        Just(Command::Reset),
        Just(Command::Capture),
        Just(Command::Dispense(DispensePosition::Spit)),
        Just(Command::Dispense(DispensePosition::Read)),
        Just(Command::Dispense(DispensePosition::Exit)),
        Just(Command::SetCapturePolicy(CapturePolicy::Prohibit)),
        Just(Command::SetCapturePolicy(CapturePolicy::ErrorBin)),
        Just(Command::SetCapturePolicy(CapturePolicy::Read)),
    ]
}

proptest! {
    /// Every 14-bit field decodes to exactly the bits it was built from.
    #[test]
    fn prop_status_field_identity(bits in 0u16..=0x3FFF) {
        let frame = common::raw_status_frame(&common::field_digits(bits));
        let flags = decode_status(&frame).unwrap();
        prop_assert_eq!(flags.bits(), bits);
    }

    /// Frames built by the codec agree with hand-built ones.
    #[test]
    fn prop_status_frame_matches_fixture(bits in any::<u16>()) {
        let built = status_frame(StatusFlags::from_bits(bits));
        let fixture = common::raw_status_frame(&common::field_digits(bits));
        prop_assert_eq!(&built[..], &fixture[..]);
    }

    /// Flipping bits of any one byte of a status frame fails the checksum.
    #[test]
    fn prop_single_byte_corruption_detected(
        bits in 0u16..=0x3FFF,
        index in 0usize..9,
        mask in 1u8..=0xFF,
    ) {
        let mut frame = status_frame(StatusFlags::from_bits(bits));
        frame[index] ^= mask;

        let result = decode_status(&frame);
        prop_assert!(
            matches!(result, Err(Error::ChecksumMismatch { .. })),
            "corruption at byte {} went undetected: {:?}",
            index,
            result
        );
    }

    /// Every encoded command parses back to itself and ends in its BCC.
    #[test]
    fn prop_command_frame_checksum(command in any_command()) {
        let bytes = command.encode();
        let (last, payload) = bytes.split_last().unwrap();
        prop_assert_eq!(*last, dispenser_protocol::bcc(payload));
        prop_assert_eq!(Command::parse(&bytes).unwrap(), command);
    }
}
