use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Checksum mismatch: expected {expected:#04X}, got {actual:#04X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Invalid status field: {0}")]
    InvalidStatusField(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error only invalidates the frame it was raised for.
    ///
    /// Corrupt or malformed frames are dropped and the link keeps polling;
    /// everything else is a failure of the link itself.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::InvalidFrameLength { .. }
                | Self::InvalidStatusField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let error = Error::ChecksumMismatch {
            expected: 0x1B,
            actual: 0xFF,
        };
        assert_eq!(
            error.to_string(),
            "Checksum mismatch: expected 0x1B, got 0xFF"
        );
    }

    #[test]
    fn test_frame_length_display() {
        let error = Error::InvalidFrameLength {
            expected: 9,
            actual: 4,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame length: expected 9 bytes, got 4"
        );
    }

    #[test]
    fn test_frame_errors_are_classified() {
        assert!(
            Error::ChecksumMismatch {
                expected: 0,
                actual: 1
            }
            .is_frame_error()
        );
        assert!(Error::InvalidStatusField("zz".into()).is_frame_error());
        assert!(!Error::Config("port".into()).is_frame_error());
        assert!(!Error::InvalidCommand("ZZ".into()).is_frame_error());
    }
}
