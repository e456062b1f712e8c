//! Status flag bitfield reported by the dispenser.
//!
//! The 16-bit field of a status frame carries 14 independent flags. A fresh
//! [`StatusFlags`] value is produced for every decoded frame; consumers keep
//! the previous value when they need edge detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// A single flag of the status bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    /// Card present at the read position.
    CaptureSensor1,
    CaptureSensor2,
    DispenseSensor,
    /// Stacker is out of cards.
    CardEmpty,
    /// Stacker is running low.
    CardPreEmpty,
    Jam,
    /// More than one card was pulled at once.
    Overlapped,
    NoCapture,
    CaptureError,
    DispenseError,
    Capturing,
    Dispensing,
    /// Error bin cannot accept more cards.
    BinFull,
    /// A sensor failed its self test.
    SensorInvalid,
}

impl StatusFlag {
    /// Every flag, lowest bit first.
    pub const ALL: [StatusFlag; 14] = [
        Self::CaptureSensor1,
        Self::CaptureSensor2,
        Self::DispenseSensor,
        Self::CardEmpty,
        Self::CardPreEmpty,
        Self::Jam,
        Self::Overlapped,
        Self::NoCapture,
        Self::CaptureError,
        Self::DispenseError,
        Self::Capturing,
        Self::Dispensing,
        Self::BinFull,
        Self::SensorInvalid,
    ];

    /// Bit of this flag in the 16-bit status field.
    pub const fn bit(self) -> u16 {
        match self {
            Self::CaptureSensor1 => 0x0001,
            Self::CaptureSensor2 => 0x0002,
            Self::DispenseSensor => 0x0004,
            Self::CardEmpty => 0x0008,
            Self::CardPreEmpty => 0x0010,
            Self::Jam => 0x0020,
            Self::Overlapped => 0x0040,
            Self::NoCapture => 0x0080,
            Self::CaptureError => 0x0100,
            Self::DispenseError => 0x0200,
            Self::Capturing => 0x0400,
            Self::Dispensing => 0x0800,
            Self::BinFull => 0x1000,
            Self::SensorInvalid => 0x2000,
        }
    }

    /// Name used in logs and observer messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CaptureSensor1 => "CaptureSensor1",
            Self::CaptureSensor2 => "CaptureSensor2",
            Self::DispenseSensor => "DispenseSensor",
            Self::CardEmpty => "CardEmpty",
            Self::CardPreEmpty => "CardPreEmpty",
            Self::Jam => "Jam",
            Self::Overlapped => "Overlapped",
            Self::NoCapture => "NoCapture",
            Self::CaptureError => "CaptureError",
            Self::DispenseError => "DispenseError",
            Self::Capturing => "Capturing",
            Self::Dispensing => "Dispensing",
            Self::BinFull => "BinFull",
            Self::SensorInvalid => "SensorInvalid",
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of flags decoded from one status frame.
///
/// Bits outside the 14 known flags are retained so that the raw field
/// survives a decode/encode cycle unchanged.
///
/// # Examples
///
/// ```
/// use dispenser_protocol::{StatusFlag, StatusFlags};
///
/// let flags = StatusFlag::Jam | StatusFlag::CaptureSensor1;
/// assert_eq!(flags.bits(), 0x0021);
/// assert!(flags.contains(StatusFlag::Jam));
/// assert!(!flags.contains(StatusFlag::BinFull));
/// assert_eq!(flags.to_string(), "CaptureSensor1 | Jam");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatusFlags(u16);

impl StatusFlags {
    /// Mask of every known flag bit.
    pub const KNOWN_BITS: u16 = 0x3FFF;

    /// Set with no flag asserted.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap a raw 16-bit status field.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw 16-bit status field.
    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, flag: StatusFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Copy of this set with `flag` asserted.
    #[must_use]
    pub const fn with(self, flag: StatusFlag) -> Self {
        Self(self.0 | flag.bit())
    }

    /// Copy of this set with `flag` cleared.
    #[must_use]
    pub const fn without(self, flag: StatusFlag) -> Self {
        Self(self.0 & !flag.bit())
    }

    /// Known flags asserted in this set, lowest bit first.
    pub fn iter(&self) -> impl Iterator<Item = StatusFlag> + '_ {
        StatusFlag::ALL
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// Bits set in the raw field that do not map to a known flag.
    pub const fn unknown_bits(&self) -> u16 {
        self.0 & !Self::KNOWN_BITS
    }
}

impl From<StatusFlag> for StatusFlags {
    fn from(flag: StatusFlag) -> Self {
        Self(flag.bit())
    }
}

impl FromIterator<StatusFlag> for StatusFlags {
    fn from_iter<I: IntoIterator<Item = StatusFlag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl BitOr<StatusFlag> for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlag) -> StatusFlags {
        self.with(rhs)
    }
}

impl BitOr for StatusFlag {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlag) -> StatusFlags {
        StatusFlags::from(self).with(rhs)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }

        let mut first = true;
        for flag in self.iter() {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(flag.name())?;
            first = false;
        }
        if self.unknown_bits() != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#06X}", self.unknown_bits())?;
        }
        Ok(())
    }
}
