//! Transport trait definition.
//!
//! The dispenser link is a byte pipe with a few extra capabilities the
//! protocol relies on: asking how many bytes are buffered, reading a single
//! byte with the port's timeout, and draining whatever has arrived.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the link loop driving a transport can be spawned onto the Tokio runtime.
//! Implementations are still free to write `async fn`.

use std::future::Future;

use crate::error::Result;

/// Byte-level link to a card dispenser.
///
/// # Examples
///
/// ```
/// use dispenser_hardware::mock::MockTransport;
/// use dispenser_hardware::traits::Transport;
/// use dispenser_protocol::Command;
///
/// #[tokio::main]
/// async fn main() -> dispenser_hardware::Result<()> {
///     let (mut transport, _device) = MockTransport::new();
///
///     transport.open().await?;
///     transport.write(&Command::StatusCheck.encode()).await?;
///     assert_eq!(transport.read_byte().await?, 0x06);
///
///     Ok(())
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Open the underlying port. Opening an open transport is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the port does not exist or rejects its settings.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close the port. Closing a closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the port is currently open.
    fn is_open(&self) -> bool;

    /// Write every byte of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is closed or the write fails.
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read one byte, waiting up to the port's read timeout.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if nothing arrives in time, see
    /// [`HardwareError::is_timeout`](crate::HardwareError::is_timeout).
    fn read_byte(&mut self) -> impl Future<Output = Result<u8>> + Send;

    /// Number of received bytes waiting to be read.
    fn bytes_available(&mut self) -> impl Future<Output = Result<usize>> + Send;

    /// Read and return every byte currently buffered.
    fn read_available(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Human-readable name used in logs.
    fn name(&self) -> &str;
}
