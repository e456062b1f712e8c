//! Transport over a native serial port.
//!
//! The `serialport` crate is blocking, so every port operation runs on
//! Tokio's blocking pool. The port sits behind `Arc<Mutex<..>>` so the
//! blocking closure can own a reference to it while the transport stays
//! borrowable.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use dispenser_core::{DataBits, Parity, SerialSettings, StopBits};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use tracing::{debug, info};

use crate::error::{HardwareError, Result};
use crate::traits::Transport;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// [`Transport`] backed by an RS-232 port.
///
/// The port is configured from [`SerialSettings`] each time it is opened,
/// including the DTR and RTS line states some dispensers need asserted
/// before they answer.
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<SharedPort>,
}

impl SerialTransport {
    /// Create a closed transport for the given settings.
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    async fn with_port<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> Result<T> + Send + 'static,
    {
        let port = self
            .port
            .clone()
            .ok_or_else(|| HardwareError::disconnected(self.settings.port_name.clone()))?;

        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut **guard)
        })
        .await
        .map_err(|err| HardwareError::communication(format!("serial task failed: {err}")))?
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.port.is_some())
            .finish()
    }
}

fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    let mut port = serialport::new(&settings.port_name, settings.baud_rate)
        .flow_control(FlowControl::None)
        .data_bits(match settings.data_bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        })
        .parity(match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        })
        .stop_bits(match settings.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        })
        .timeout(settings.read_write_timeout())
        .open()
        .map_err(|err| {
            HardwareError::initialization_failed(format!(
                "cannot open {}: {}",
                settings.port_name, err.description
            ))
        })?;

    port.write_data_terminal_ready(settings.dtr)?;
    port.write_request_to_send(settings.rts)?;
    port.clear(ClearBuffer::All)?;
    Ok(port)
}

impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let settings = self.settings.clone();
        let port = tokio::task::spawn_blocking(move || open_port(&settings))
            .await
            .map_err(|err| HardwareError::initialization_failed(err.to_string()))??;

        info!(port = %self.settings, "Serial port opened");
        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(port = %self.settings.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let bytes = bytes.to_vec();
        self.with_port(move |port| {
            port.write_all(&bytes)?;
            port.flush()?;
            Ok(())
        })
        .await
    }

    async fn read_byte(&mut self) -> Result<u8> {
        let timeout = self.settings.read_write_timeout_ms;
        self.with_port(move |port| {
            let mut byte = [0u8; 1];
            match port.read_exact(&mut byte) {
                Ok(()) => Ok(byte[0]),
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                    Err(HardwareError::timeout(timeout))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        self.with_port(|port| Ok(port.bytes_to_read()? as usize))
            .await
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        self.with_port(|port| {
            let pending = port.bytes_to_read()? as usize;
            let mut buffer = vec![0u8; pending];
            port.read_exact(&mut buffer)?;
            Ok(buffer)
        })
        .await
    }

    fn name(&self) -> &str {
        &self.settings.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_port_rejects_io() {
        let mut transport = SerialTransport::new(SerialSettings::new("COM7"));

        assert!(!transport.is_open());
        assert_eq!(transport.name(), "COM7");
        assert!(matches!(
            transport.write(&[0x05]).await,
            Err(HardwareError::Disconnected { .. })
        ));
        assert!(matches!(
            transport.bytes_available().await,
            Err(HardwareError::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let mut transport =
            SerialTransport::new(SerialSettings::new("/dev/this-port-does-not-exist"));

        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, HardwareError::InitializationFailed { .. }));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut transport = SerialTransport::new(SerialSettings::default());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }
}
