//! Errors raised by the link loop.
//!
//! None of these reach callers of the public operations; those only ever see
//! an [`OperationOutcome`](crate::OperationOutcome). They are logged by the
//! loop and published as exception events.

use dispenser_hardware::HardwareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispenserError {
    /// Codec or configuration failure.
    #[error(transparent)]
    Core(#[from] dispenser_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] HardwareError),

    /// A status check was acknowledged but no complete frame followed.
    #[error("No status response within {waited_ms}ms")]
    NoResponse { waited_ms: u64 },

    #[error("Dispenser service stopped")]
    Stopped,
}

impl DispenserError {
    /// Whether only the current frame is lost and the link stays usable.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_frame_error())
    }
}

pub type Result<T> = std::result::Result<T, DispenserError>;
