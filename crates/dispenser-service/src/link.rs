//! Link state machine.
//!
//! One task owns the transport and drives it one step per tick:
//!
//! ```text
//!                open                 command sent
//! NotConnected ───────► AwaitingAcknowledge ───────► AwaitingHandshake
//!      ▲                     ▲      ▲                  │        │
//!      │ failure             │      └──────────────────┘        │ ACK after
//!      │                     │   no ACK, or ACK to an action    │ status check
//!      │                     │                                  ▼
//!      └── any state         └───────── frame handled ──── AwaitingStatus
//! ```
//!
//! A failed cycle closes the transport and waits out the backoff before the
//! port is reopened. A corrupt or malformed status frame is dropped without
//! touching the link.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dispenser_core::constants::{ACK, ENQ, STATUS_FRAME_LEN};
use dispenser_hardware::Transport;
use dispenser_protocol::{Command, StatusFlag, StatusFlags, command::hex, decode_status};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{DispenserConfig, ErrorMode};
use crate::error::{DispenserError, Result};
use crate::events::{DispenserEvent, EventSink, MessageKind};
use crate::operation::{OperationKind, OperationOutcome};
use crate::orchestrator::{FollowUp, Orchestrator};
use crate::recovery::{self, RecoverySequence};
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Port closed; the next cycle opens it.
    #[default]
    NotConnected,

    /// Ready to send the next command: the pending operation's, or a status
    /// check when there is none.
    AwaitingAcknowledge,

    /// Command sent; the next cycle expects ACK and answers with ENQ.
    AwaitingHandshake,

    /// Status check acknowledged; waiting for the 9-byte status frame.
    AwaitingStatus,
}

/// Sleep for `ms` milliseconds unless the service is stopped first.
pub(crate) async fn pause(shutdown: &CancellationToken, ms: u64) -> Result<()> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(DispenserError::Stopped),
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
    }
}

/// Encode and write one command.
pub(crate) async fn send<T: Transport>(transport: &mut T, command: Command) -> Result<()> {
    let bytes = command.encode();
    if command.is_status_check() {
        trace!(%command, bytes = %hex(&bytes), "Sending command");
    } else {
        debug!(%command, bytes = %hex(&bytes), "Sending command");
    }
    transport.write(&bytes).await?;
    Ok(())
}

pub(crate) struct Link<T: Transport> {
    transport: T,
    config: DispenserConfig,
    orchestrator: Arc<Orchestrator>,
    events: EventSink,
    resolver: Resolver,
    state: LinkState,
    /// Command written in the current handshake.
    sent: Option<Command>,
    status_requested_at: Option<Instant>,
    /// Last cycle failed; the next successful open is announced.
    failed: bool,
    shutdown: CancellationToken,
}

impl<T: Transport> Link<T> {
    pub(crate) fn new(
        transport: T,
        config: DispenserConfig,
        orchestrator: Arc<Orchestrator>,
        events: EventSink,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            config,
            orchestrator,
            events,
            resolver: Resolver::new(),
            state: LinkState::NotConnected,
            sent: None,
            status_requested_at: None,
            failed: false,
            shutdown,
        }
    }

    /// Drive the link until the service is stopped.
    pub(crate) async fn run(mut self) {
        info!(transport = self.transport.name(), "Dispenser link started");

        loop {
            let delay_ms = match self.cycle().await {
                Ok(()) => self.config.timing.tick_interval_ms,
                Err(DispenserError::Stopped) => break,
                Err(err) if err.is_frame_error() => {
                    warn!(error = %err, "Dropped invalid status frame");
                    self.config.timing.tick_interval_ms
                }
                Err(err) => {
                    self.fail(err).await;
                    self.config.timing.backoff_interval_ms
                }
            };

            if pause(&self.shutdown, delay_ms).await.is_err() {
                break;
            }
        }

        if let Err(err) = self.transport.close().await {
            warn!(error = %err, "Failed to close transport on shutdown");
        }
        self.orchestrator.abandon();
        info!("Dispenser link stopped");
    }

    async fn cycle(&mut self) -> Result<()> {
        match self.state {
            LinkState::NotConnected => self.connect().await,
            LinkState::AwaitingAcknowledge => {
                let command = self
                    .orchestrator
                    .take_command()
                    .unwrap_or(Command::StatusCheck);
                send(&mut self.transport, command).await?;
                self.sent = Some(command);
                self.state = LinkState::AwaitingHandshake;
                Ok(())
            }
            LinkState::AwaitingHandshake => self.handshake().await,
            LinkState::AwaitingStatus => self.poll_status().await,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        self.transport.open().await?;
        self.resolver.clear();
        self.state = LinkState::AwaitingAcknowledge;

        if std::mem::take(&mut self.failed) {
            info!(transport = self.transport.name(), "Dispenser link restored");
            self.events.emit(DispenserEvent::ExceptionCleared);
        } else {
            debug!(transport = self.transport.name(), "Dispenser link opened");
        }
        Ok(())
    }

    async fn handshake(&mut self) -> Result<()> {
        let sent = self.sent.take();
        self.state = LinkState::AwaitingAcknowledge;

        if self.transport.bytes_available().await? == 0 {
            debug!(command = ?sent, "No acknowledge received");
            return Ok(());
        }
        let byte = self.transport.read_byte().await?;
        if byte != ACK {
            debug!(
                command = ?sent,
                byte = format_args!("{byte:#04X}"),
                "Unexpected byte instead of acknowledge"
            );
            return Ok(());
        }

        self.transport.write(&[ENQ]).await?;
        pause(&self.shutdown, self.config.timing.ack_settle_ms).await?;

        if sent.is_some_and(|command| command.is_status_check()) {
            self.state = LinkState::AwaitingStatus;
            self.status_requested_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn poll_status(&mut self) -> Result<()> {
        let available = self.transport.bytes_available().await?;
        match available.cmp(&STATUS_FRAME_LEN) {
            Ordering::Less => {
                let waited = self
                    .status_requested_at
                    .map_or(Duration::ZERO, |requested| requested.elapsed());
                if waited > self.config.response_timeout() {
                    return Err(DispenserError::NoResponse {
                        waited_ms: waited.as_millis() as u64,
                    });
                }
                Ok(())
            }
            Ordering::Greater => {
                let stale = self.transport.read_available().await?;
                self.status_handled();
                warn!(
                    len = stale.len(),
                    bytes = %hex(&stale),
                    "Discarded oversized status response"
                );
                Ok(())
            }
            Ordering::Equal => {
                let frame = self.transport.read_available().await?;
                self.status_handled();
                let flags = decode_status(&frame)?;
                self.handle_status(flags).await
            }
        }
    }

    fn status_handled(&mut self) {
        self.state = LinkState::AwaitingAcknowledge;
        self.status_requested_at = None;
    }

    async fn handle_status(&mut self, flags: StatusFlags) -> Result<()> {
        trace!(%flags, "Status decoded");
        self.resolve_faults(flags).await?;
        self.resolve_warnings(flags).await?;
        self.resolve_sensor(flags).await
    }

    async fn resolve_faults(&mut self, flags: StatusFlags) -> Result<()> {
        let scan = self.resolver.scan_faults(flags);
        for fault in &scan.raised {
            error!(%fault, "Device fault");
            match self.config.error_mode {
                ErrorMode::Fatal => self.events.message(MessageKind::Error, fault.name()),
                ErrorMode::BestEffort => self.events.emit(DispenserEvent::Exception {
                    error: format!("Device fault: {fault}"),
                }),
            }
        }

        if scan.needs_reset(self.config.error_mode) {
            let aborted = self.orchestrator.motion_in_flight();
            self.recover(RecoverySequence::Reset).await?;
            self.resolver.retain(scan.asserted);
            if let Some(id) = aborted {
                self.orchestrator.resolve(id, OperationOutcome::Failed);
            }
        }
        Ok(())
    }

    async fn resolve_warnings(&mut self, flags: StatusFlags) -> Result<()> {
        for warning in self.resolver.scan_warnings(flags) {
            warn!(%warning, "Device warning");
            self.events.message(MessageKind::Warning, warning.name());
        }

        if flags.contains(StatusFlag::CaptureError)
            && let Some(id) = self
                .orchestrator
                .pending_id(OperationKind::CapturingToReadPosition)
        {
            warn!("Capture error while capturing to read position");
            self.recover(RecoverySequence::Reset).await?;
            self.orchestrator.resolve(id, OperationOutcome::Failed);
        }
        Ok(())
    }

    async fn resolve_sensor(&mut self, flags: StatusFlags) -> Result<()> {
        let follow_up =
            self.orchestrator
                .observe(flags, Instant::now(), self.config.take_wait_timeout());

        match follow_up {
            None => {}
            Some(FollowUp::ProhibitThenComplete(id)) => {
                self.recover(RecoverySequence::ProhibitCapture).await?;
                self.orchestrator.resolve(id, OperationOutcome::Completed);
            }
            Some(FollowUp::Recapture(id)) => {
                self.recover(RecoverySequence::CaptureToErrorBin).await?;
                self.orchestrator.resolve(id, OperationOutcome::Recaptured);
            }
        }
        Ok(())
    }

    async fn recover(&mut self, sequence: RecoverySequence) -> Result<()> {
        if sequence == RecoverySequence::Reset {
            self.resolver.clear();
        }
        recovery::run(
            &mut self.transport,
            sequence,
            &self.config.timing,
            &self.shutdown,
        )
        .await
    }

    async fn fail(&mut self, err: DispenserError) {
        error!(error = %err, state = ?self.state, "Dispenser link failed");
        self.events.emit(DispenserEvent::Exception {
            error: err.to_string(),
        });

        self.failed = true;
        self.state = LinkState::NotConnected;
        self.sent = None;
        self.status_requested_at = None;
        if let Err(close_err) = self.transport.close().await {
            debug!(error = %close_err, "Failed to close transport after failure");
        }
    }
}
