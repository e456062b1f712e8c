//! Mock dispenser for testing and development.
//!
//! The mock speaks the device side of the handshake: every well-formed
//! command frame is acknowledged with ACK, and the ENQ that follows a status
//! check is answered with a status frame built from the flags currently set
//! through the handle. Motion commands have no physical effect; tests move
//! cards by changing the flags.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dispenser_core::constants::{ACK, ENQ};
use dispenser_protocol::{Command, StatusFlag, StatusFlags, sensor_frame, status_frame};

use crate::error::{HardwareError, Result};
use crate::traits::Transport;

const DEFAULT_NAME: &str = "Mock Dispenser";

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    open_count: usize,
    flags: StatusFlags,
    /// Bytes the device has sent and the host has not read yet.
    rx: VecDeque<u8>,
    /// Every write from the host, one entry per call. Unbounded until
    /// cleared through the handle.
    writes: Vec<Vec<u8>>,
    /// Command waiting for its ENQ.
    awaiting_enq: Option<Command>,
    fail_open: bool,
    fail_writes: bool,
    silent: bool,
    status_muted: bool,
    corrupt_status: bool,
}

impl DeviceState {
    fn receive(&mut self, bytes: &[u8]) {
        self.writes.push(bytes.to_vec());
        if self.silent {
            return;
        }

        if bytes == [ENQ] {
            match self.awaiting_enq.take() {
                Some(Command::StatusCheck) if !self.status_muted => {
                    let mut frame = status_frame(self.flags);
                    if self.corrupt_status {
                        frame[8] ^= 0xFF;
                    }
                    self.rx.extend(frame);
                }
                Some(Command::SensorCheck) => self.rx.extend(sensor_frame(self.flags)),
                _ => {}
            }
            return;
        }

        if let Ok(command) = Command::parse(bytes) {
            self.rx.push_back(ACK);
            self.awaiting_enq = Some(command);
        }
    }
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock dispenser transport for testing and development.
///
/// Every host write is kept for inspection, so a long-running link makes the
/// history grow without bound. Call
/// [`MockTransportHandle::clear_writes`] periodically when the mock backs a
/// long development session.
///
/// # Examples
///
/// ```
/// use dispenser_hardware::mock::MockTransport;
/// use dispenser_hardware::traits::Transport;
/// use dispenser_protocol::{Command, StatusFlag, decode_status};
///
/// #[tokio::main]
/// async fn main() -> dispenser_hardware::Result<()> {
///     let (mut transport, device) = MockTransport::new();
///     device.insert_flag(StatusFlag::CardPreEmpty);
///
///     transport.open().await?;
///     transport.write(&Command::StatusCheck.encode()).await?;
///     assert_eq!(transport.read_byte().await?, 0x06);
///     transport.write(&[0x05]).await?;
///
///     let frame = transport.read_available().await?;
///     let flags = decode_status(&frame).unwrap();
///     assert!(flags.contains(StatusFlag::CardPreEmpty));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<DeviceState>>,
    name: String,
    read_timeout_ms: u64,
}

impl MockTransport {
    /// Create a new mock dispenser with the default name.
    ///
    /// Returns the transport together with a handle that scripts the
    /// device and inspects what the host wrote.
    pub fn new() -> (Self, MockTransportHandle) {
        Self::with_name(DEFAULT_NAME)
    }

    /// Create a new mock dispenser with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        let transport = Self {
            state: Arc::clone(&state),
            name: name.into(),
            read_timeout_ms: dispenser_core::constants::DEFAULT_READ_WRITE_TIMEOUT_MS,
        };
        (transport, MockTransportHandle { state })
    }

    fn check_open(&self, state: &DeviceState) -> Result<()> {
        if state.open {
            Ok(())
        } else {
            Err(HardwareError::disconnected(self.name.clone()))
        }
    }
}

impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(HardwareError::initialization_failed(format!(
                "cannot open {}",
                self.name
            )));
        }
        if !state.open {
            state.open = true;
            state.open_count += 1;
            state.rx.clear();
            state.awaiting_enq = None;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        lock(&self.state).open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        self.check_open(&state)?;
        if state.fail_writes {
            return Err(HardwareError::communication("write failed"));
        }
        state.receive(bytes);
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<u8> {
        let mut state = lock(&self.state);
        self.check_open(&state)?;
        state
            .rx
            .pop_front()
            .ok_or_else(|| HardwareError::timeout(self.read_timeout_ms))
    }

    async fn bytes_available(&mut self) -> Result<usize> {
        let state = lock(&self.state);
        self.check_open(&state)?;
        Ok(state.rx.len())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        self.check_open(&state)?;
        Ok(state.rx.drain(..).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for scripting a mock dispenser.
///
/// The handle can be cloned and shared across tasks. It changes the flags
/// the device reports, injects raw bytes, injects faults and records what
/// the host wrote.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl MockTransportHandle {
    /// Replace the flags reported by subsequent status frames.
    pub fn set_flags(&self, flags: StatusFlags) {
        lock(&self.state).flags = flags;
    }

    pub fn insert_flag(&self, flag: StatusFlag) {
        let mut state = lock(&self.state);
        state.flags = state.flags.with(flag);
    }

    pub fn remove_flag(&self, flag: StatusFlag) {
        let mut state = lock(&self.state);
        state.flags = state.flags.without(flag);
    }

    pub fn flags(&self) -> StatusFlags {
        lock(&self.state).flags
    }

    /// Queue raw bytes as if the device had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }

    /// Make every subsequent `open` fail.
    pub fn set_fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// Make every subsequent `write` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Stop answering: no ACK and no status frame.
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    /// Keep acknowledging commands but never send a status frame.
    pub fn set_status_muted(&self, muted: bool) {
        lock(&self.state).status_muted = muted;
    }

    /// Flip the BCC of every status frame while set.
    pub fn set_corrupt_status(&self, corrupt: bool) {
        lock(&self.state).corrupt_status = corrupt;
    }

    /// Number of times the port was opened.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Raw writes from the host, oldest first.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Command frames written by the host, oldest first. ENQ echoes and
    /// malformed writes are skipped.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.state)
            .writes
            .iter()
            .filter_map(|bytes| Command::parse(bytes).ok())
            .collect()
    }

    /// Command frames other than status checks, oldest first.
    pub fn actions(&self) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|command| !command.is_status_check())
            .collect()
    }

    /// How often `command` was written.
    pub fn count(&self, command: Command) -> usize {
        self.commands().into_iter().filter(|c| *c == command).count()
    }

    /// Forget every recorded write.
    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }
}
