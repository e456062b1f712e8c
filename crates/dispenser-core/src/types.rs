use crate::{
    Result,
    constants::{DEFAULT_BAUD_RATE, DEFAULT_PORT_NAME, DEFAULT_READ_WRITE_TIMEOUT_MS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Parity checking mode of the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    /// Number of bits as an integer.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

/// Number of stop bits closing each character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Connection settings of the serial line the dispenser hangs on.
///
/// Defaults match the factory configuration of the device:
/// `COM1`, 9600 baud, 8N1, 1000 ms read/write timeout.
///
/// # Examples
///
/// ```
/// use dispenser_core::SerialSettings;
///
/// let settings = SerialSettings::new("/dev/ttyUSB0").with_baud_rate(19_200);
/// assert_eq!(settings.port_name, "/dev/ttyUSB0");
/// assert_eq!(settings.baud_rate, 19_200);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path or port name (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port_name: String,

    /// Line speed in bits per second.
    pub baud_rate: u32,

    pub parity: Parity,

    pub data_bits: DataBits,

    pub stop_bits: StopBits,

    /// Timeout applied to every blocking read and write on the port.
    pub read_write_timeout_ms: u64,

    /// Assert the Data Terminal Ready line after opening.
    pub dtr: bool,

    /// Assert the Request To Send line after opening.
    pub rts: bool,
}

impl SerialSettings {
    /// Create settings for the given port with every other value defaulted.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read/write timeout in milliseconds.
    #[must_use]
    pub fn with_read_write_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.read_write_timeout_ms = timeout_ms;
        self
    }

    /// Read/write timeout as a [`Duration`].
    #[must_use]
    pub fn read_write_timeout(&self) -> Duration {
        Duration::from_millis(self.read_write_timeout_ms)
    }

    /// Check that the settings can be used to open a port.
    ///
    /// # Errors
    /// Returns `Error::Config` if the port name is blank, the baud rate is zero
    /// or the read/write timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.port_name.trim().is_empty() {
            return Err(Error::Config("serial port name must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud rate must be greater than zero".into()));
        }
        if self.read_write_timeout_ms == 0 {
            return Err(Error::Config(
                "read/write timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT_NAME.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::default(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            read_write_timeout_ms: DEFAULT_READ_WRITE_TIMEOUT_MS,
            dtr: false,
            rts: false,
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(
            f,
            "{}@{} {}{}{}",
            self.port_name,
            self.baud_rate,
            self.data_bits.as_u8(),
            parity,
            stop
        )
    }
}
