//! Service configuration.
//!
//! Defaults match the timing the dispenser firmware expects. Every field has
//! a serde default, so a partial document only needs to name what differs.

use std::time::Duration;

use dispenser_core::constants::*;
use dispenser_core::{Error, Result, SerialSettings};
use serde::{Deserialize, Serialize};

/// How device faults are surfaced and recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Faults are reported as error messages and the device is reset on
    /// every cycle in which any fault stays asserted.
    #[default]
    Fatal,

    /// Faults are reported as exceptions and the device is reset once, when
    /// a fault first appears.
    BestEffort,
}

/// Delays of the link loop and of the recovery sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTiming {
    /// Sleep between two cycles.
    pub tick_interval_ms: u64,

    /// Sleep after a failed cycle before the port is reopened.
    pub backoff_interval_ms: u64,

    /// Settle delay after echoing ENQ.
    pub ack_settle_ms: u64,

    /// Delay between a recovery command and reading its ACK.
    pub recovery_ack_delay_ms: u64,

    /// Settle delay after a reset or capture step.
    pub recovery_settle_ms: u64,

    /// Settle delay after the prohibit-capture step.
    pub prohibit_settle_ms: u64,
}

impl LinkTiming {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn backoff_interval(&self) -> Duration {
        Duration::from_millis(self.backoff_interval_ms)
    }
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            backoff_interval_ms: DEFAULT_BACKOFF_INTERVAL_MS,
            ack_settle_ms: DEFAULT_ACK_SETTLE_MS,
            recovery_ack_delay_ms: DEFAULT_RECOVERY_ACK_DELAY_MS,
            recovery_settle_ms: DEFAULT_RECOVERY_SETTLE_MS,
            prohibit_settle_ms: DEFAULT_PROHIBIT_SETTLE_MS,
        }
    }
}

/// Configuration of a [`DispenserService`](crate::DispenserService).
///
/// # Examples
///
/// ```
/// use dispenser_service::{DispenserConfig, ErrorMode};
///
/// let config: DispenserConfig = serde_json::from_str(
///     r#"{ "serial": { "port_name": "/dev/ttyS1" }, "error_mode": "best_effort" }"#,
/// ).unwrap();
///
/// assert_eq!(config.serial.port_name, "/dev/ttyS1");
/// assert_eq!(config.serial.baud_rate, 9600);
/// assert_eq!(config.error_mode, ErrorMode::BestEffort);
/// assert_eq!(config.take_wait_timeout_ms, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenserConfig {
    pub serial: SerialSettings,

    /// Maximum wait for a complete status frame after a status check.
    pub response_timeout_ms: u64,

    /// How long a card may wait at the exit before it is recaptured.
    pub take_wait_timeout_ms: u64,

    pub error_mode: ErrorMode,

    pub timing: LinkTiming,
}

impl DispenserConfig {
    /// Default configuration for the given serial port.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            serial: SerialSettings::new(port_name),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    #[must_use]
    pub fn with_take_wait_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.take_wait_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: LinkTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn take_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.take_wait_timeout_ms)
    }

    /// Check that the configuration can drive a link.
    ///
    /// # Errors
    /// Returns `Error::Config` for invalid serial settings, a zero response
    /// or take-wait timeout and a zero tick interval.
    pub fn validate(&self) -> Result<()> {
        self.serial.validate()?;
        if self.response_timeout_ms == 0 {
            return Err(Error::Config(
                "response timeout must be greater than zero".into(),
            ));
        }
        if self.take_wait_timeout_ms == 0 {
            return Err(Error::Config(
                "take-wait timeout must be greater than zero".into(),
            ));
        }
        if self.timing.tick_interval_ms == 0 {
            return Err(Error::Config("tick interval must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            take_wait_timeout_ms: DEFAULT_TAKE_WAIT_TIMEOUT_MS,
            error_mode: ErrorMode::default(),
            timing: LinkTiming::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_match_device() {
        let config = DispenserConfig::default();

        assert_eq!(config.serial.port_name, "COM1");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_write_timeout_ms, 1000);
        assert_eq!(config.response_timeout_ms, 2000);
        assert_eq!(config.take_wait_timeout_ms, 10_000);
        assert_eq!(config.error_mode, ErrorMode::Fatal);
        assert_eq!(config.timing.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.timing.backoff_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::blank_port(DispenserConfig::new("  "))]
    #[case::zero_response(DispenserConfig::default().with_response_timeout_ms(0))]
    #[case::zero_take_wait(DispenserConfig::default().with_take_wait_timeout_ms(0))]
    #[case::zero_tick(DispenserConfig::default().with_timing(LinkTiming {
        tick_interval_ms: 0,
        ..LinkTiming::default()
    }))]
    fn test_validate_rejects(#[case] config: DispenserConfig) {
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = DispenserConfig::new("/dev/ttyUSB0")
            .with_error_mode(ErrorMode::BestEffort)
            .with_take_wait_timeout_ms(15_000);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: DispenserConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_timing_document() {
        let config: DispenserConfig =
            serde_json::from_str(r#"{ "timing": { "backoff_interval_ms": 1000 } }"#).unwrap();

        assert_eq!(config.timing.backoff_interval_ms, 1000);
        assert_eq!(config.timing.tick_interval_ms, 200);
    }
}
