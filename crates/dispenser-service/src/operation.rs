//! Operation kinds, outcomes and per-operation completion tokens.
//!
//! Every accepted operation gets its own [`Completion`]. The loop resolves it
//! by operation id, so a late resolution can never land on an operation
//! accepted after it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What the pending operation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// No operation in flight.
    #[default]
    Idle,

    /// Waiting for an inserted card to reach the read position.
    CapturingToReadPosition,

    /// Waiting for a dispensed card to reach the read position.
    DispensingToReadPosition,

    /// Waiting for a dispensed card to reach the exit.
    DispensingToExitPosition,

    /// Card is at the exit; waiting for the customer to take it.
    AwaitingCardTakeAtExit,

    /// Waiting for the next decoded status frame.
    AwaitingStatusQuery,

    /// Waiting for a spat card to leave the sensor.
    AwaitingSpit,
}

impl OperationKind {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the operation moves a card, and so is aborted by a reset.
    pub fn is_motion(&self) -> bool {
        !matches!(self, Self::Idle | Self::AwaitingStatusQuery)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::CapturingToReadPosition => "CapturingToReadPosition",
            Self::DispensingToReadPosition => "DispensingToReadPosition",
            Self::DispensingToExitPosition => "DispensingToExitPosition",
            Self::AwaitingCardTakeAtExit => "AwaitingCardTakeAtExit",
            Self::AwaitingStatusQuery => "AwaitingStatusQuery",
            Self::AwaitingSpit => "AwaitingSpit",
        };
        write!(f, "{name}")
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Completed,

    /// The card was not taken in time and was captured to the error bin.
    Recaptured,

    /// A device fault or capture error aborted the operation.
    Failed,

    /// `cancel_capture` was called.
    Cancelled,

    /// Another operation was already in flight.
    Rejected,

    /// The service stopped before the operation resolved.
    Abandoned,
}

impl OperationOutcome {
    /// `true` for [`Completed`](Self::Completed) and
    /// [`Recaptured`](Self::Recaptured).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Recaptured)
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of an accepted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OperationId(pub(crate) u64);

/// Future resolving to the outcome of one operation.
///
/// Dropping a completion does not cancel the operation.
///
/// # Examples
///
/// ```
/// use dispenser_service::{Completion, OperationOutcome};
///
/// # #[tokio::main]
/// # async fn main() {
/// let completion = Completion::ready(OperationOutcome::Rejected);
/// assert_eq!(completion.await, OperationOutcome::Rejected);
/// # }
/// ```
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited or polled"]
pub struct Completion {
    rx: oneshot::Receiver<OperationOutcome>,
}

impl Completion {
    /// Completion that is already resolved.
    pub fn ready(outcome: OperationOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    pub(crate) fn pending() -> (oneshot::Sender<OperationOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Outcome if the operation has resolved, without waiting.
    pub fn try_outcome(&mut self) -> Option<OperationOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(OperationOutcome::Abandoned),
        }
    }
}

impl Future for Completion {
    type Output = OperationOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(OperationOutcome::Abandoned))
    }
}

/// The operation currently in flight.
#[derive(Debug)]
pub(crate) struct PendingOperation {
    pub(crate) id: OperationId,
    pub(crate) kind: OperationKind,
    /// Command still to be sent for this operation.
    pub(crate) command: Option<dispenser_protocol::Command>,
    /// Also the start of the take wait for a dispense to the exit.
    pub(crate) accepted_at: Instant,
    reply: oneshot::Sender<OperationOutcome>,
}

impl PendingOperation {
    pub(crate) fn new(
        id: OperationId,
        kind: OperationKind,
        command: dispenser_protocol::Command,
    ) -> (Self, Completion) {
        let (reply, completion) = Completion::pending();
        let pending = Self {
            id,
            kind,
            command: Some(command),
            accepted_at: Instant::now(),
            reply,
        };
        (pending, completion)
    }

    /// Resolve the operation. A dropped completion is not an error.
    pub(crate) fn resolve(self, outcome: OperationOutcome) {
        let _ = self.reply.send(outcome);
    }
}
