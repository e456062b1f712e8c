//! Recovery sequences.
//!
//! Each step sends a command, waits for the device to acknowledge it, echoes
//! ENQ and lets the mechanism settle. Sequences run inside a link cycle, so
//! nothing else is written to the transport until they finish.

use std::fmt;

use dispenser_core::constants::{ACK, ENQ};
use dispenser_hardware::Transport;
use dispenser_protocol::{CapturePolicy, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LinkTiming;
use crate::error::Result;
use crate::link::{pause, send};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoverySequence {
    /// Soft reset, then prohibit capture.
    Reset,

    /// Divert to the error bin, capture, then prohibit capture.
    CaptureToErrorBin,

    /// Refuse further inserted cards.
    ProhibitCapture,
}

/// One command of a sequence and the settle delay after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStep {
    pub command: Command,
    pub settle_ms: u64,
}

impl RecoverySequence {
    /// Commands of this sequence in the order they are sent.
    pub fn steps(&self, timing: &LinkTiming) -> Vec<RecoveryStep> {
        let prohibit = RecoveryStep {
            command: Command::SetCapturePolicy(CapturePolicy::Prohibit),
            settle_ms: timing.prohibit_settle_ms,
        };
        let settled = |command| RecoveryStep {
            command,
            settle_ms: timing.recovery_settle_ms,
        };

        match self {
            Self::Reset => vec![settled(Command::Reset), prohibit],
            Self::CaptureToErrorBin => vec![
                settled(Command::SetCapturePolicy(CapturePolicy::ErrorBin)),
                settled(Command::Capture),
                prohibit,
            ],
            Self::ProhibitCapture => vec![prohibit],
        }
    }
}

impl fmt::Display for RecoverySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "Reset"),
            Self::CaptureToErrorBin => write!(f, "CaptureToErrorBin"),
            Self::ProhibitCapture => write!(f, "ProhibitCapture"),
        }
    }
}

/// Run `sequence` to completion on `transport`.
///
/// A step the device does not acknowledge is logged and the sequence moves
/// on; only transport failures abort it.
pub(crate) async fn run<T: Transport>(
    transport: &mut T,
    sequence: RecoverySequence,
    timing: &LinkTiming,
    shutdown: &CancellationToken,
) -> Result<()> {
    info!(%sequence, "Running recovery sequence");

    for step in sequence.steps(timing) {
        send(transport, step.command).await?;
        pause(shutdown, timing.recovery_ack_delay_ms).await?;

        match transport.read_byte().await {
            Ok(ACK) => {}
            Ok(byte) => warn!(
                command = %step.command,
                byte = format_args!("{byte:#04X}"),
                "Unexpected reply to recovery step"
            ),
            Err(err) if err.is_timeout() => {
                warn!(command = %step.command, "Recovery step not acknowledged")
            }
            Err(err) => return Err(err.into()),
        }

        transport.write(&[ENQ]).await?;
        pause(shutdown, step.settle_ms).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_hardware::mock::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_reset_steps() {
        let steps = RecoverySequence::Reset.steps(&LinkTiming::default());
        assert_eq!(
            steps,
            vec![
                RecoveryStep {
                    command: Command::Reset,
                    settle_ms: 1000
                },
                RecoveryStep {
                    command: Command::SetCapturePolicy(CapturePolicy::Prohibit),
                    settle_ms: 100
                },
            ]
        );
    }

    #[test]
    fn test_capture_to_error_bin_commands() {
        let commands: Vec<_> = RecoverySequence::CaptureToErrorBin
            .steps(&LinkTiming::default())
            .into_iter()
            .map(|step| step.command)
            .collect();

        assert_eq!(
            commands,
            vec![
                Command::SetCapturePolicy(CapturePolicy::ErrorBin),
                Command::Capture,
                Command::SetCapturePolicy(CapturePolicy::Prohibit),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_handshake_per_step() {
        let (mut transport, device) = MockTransport::new();
        transport.open().await.unwrap();
        let started = tokio::time::Instant::now();

        run(
            &mut transport,
            RecoverySequence::Reset,
            &LinkTiming::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], Command::Reset.encode().to_vec());
        assert_eq!(writes[1], vec![ENQ]);
        assert_eq!(writes[3], vec![ENQ]);
        assert_eq!(started.elapsed(), Duration::from_millis(100 + 1000 + 100 + 100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tolerates_silent_device() {
        let (mut transport, device) = MockTransport::new();
        transport.open().await.unwrap();
        device.set_silent(true);

        run(
            &mut transport,
            RecoverySequence::ProhibitCapture,
            &LinkTiming::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(device.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (mut transport, _device) = MockTransport::new();
        transport.open().await.unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = run(
            &mut transport,
            RecoverySequence::Reset,
            &LinkTiming::default(),
            &shutdown,
        )
        .await;
        assert!(matches!(result, Err(crate::DispenserError::Stopped)));
    }
}
