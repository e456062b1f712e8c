//! Operation orchestrator.
//!
//! Holds the single pending operation, the command it still has to send and
//! the card-presence state. Callers mutate it from any task through the
//! public handle; the link loop reads the queued command and feeds decoded
//! status frames back in. All state sits behind one lock that is never held
//! across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dispenser_protocol::{CapturePolicy, Command, DispensePosition, StatusFlag, StatusFlags};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{DispenserEvent, EventSink};
use crate::operation::{
    Completion, OperationId, OperationKind, OperationOutcome, PendingOperation,
};

/// Device work the link must do before a pending operation can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// Card taken from the exit: prohibit capture, then complete.
    ProhibitThenComplete(OperationId),

    /// Card was not taken in time: capture it to the error bin.
    Recapture(OperationId),
}

#[derive(Debug, Default)]
struct State {
    pending: Option<PendingOperation>,
    next_id: u64,
    card_present: bool,
    last_status: Option<StatusFlags>,
    stopped: bool,
}

#[derive(Debug)]
pub(crate) struct Orchestrator {
    state: Mutex<State>,
    events: EventSink,
}

impl Orchestrator {
    pub(crate) fn new(events: EventSink) -> Self {
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn capture_card_to_read(&self) -> Completion {
        self.request(
            OperationKind::CapturingToReadPosition,
            Command::SetCapturePolicy(CapturePolicy::Read),
        )
    }

    pub(crate) fn dispense_card_to_read(&self) -> Completion {
        self.request(
            OperationKind::DispensingToReadPosition,
            Command::Dispense(DispensePosition::Read),
        )
    }

    pub(crate) fn dispense_card_to_exit(&self) -> Completion {
        self.request(
            OperationKind::DispensingToExitPosition,
            Command::Dispense(DispensePosition::Exit),
        )
    }

    pub(crate) fn get_status(&self) -> Completion {
        self.request(OperationKind::AwaitingStatusQuery, Command::StatusCheck)
    }

    pub(crate) fn spit_card(&self) -> Completion {
        {
            let state = self.lock();
            if !state.stopped && state.pending.is_none() && !state.card_present {
                debug!("No card at the sensor, nothing to spit");
                return Completion::ready(OperationOutcome::Completed);
            }
        }
        self.request(
            OperationKind::AwaitingSpit,
            Command::Dispense(DispensePosition::Spit),
        )
    }

    fn request(&self, kind: OperationKind, command: Command) -> Completion {
        let mut state = self.lock();
        if state.stopped {
            return Completion::ready(OperationOutcome::Abandoned);
        }
        if let Some(pending) = &state.pending {
            warn!(
                requested = %kind,
                pending = %pending.kind,
                "Operation rejected, another one is in flight"
            );
            return Completion::ready(OperationOutcome::Rejected);
        }

        state.next_id += 1;
        let id = OperationId(state.next_id);
        let (pending, completion) = PendingOperation::new(id, kind, command);
        state.pending = Some(pending);
        drop(state);

        debug!(operation = %kind, %command, "Operation accepted");
        self.events.emit(DispenserEvent::StatusChanged(kind));
        completion
    }

    /// Resolve a pending capture as cancelled. Returns `false` when no
    /// capture is pending.
    pub(crate) fn cancel_capture(&self) -> bool {
        let id = self.pending_id(OperationKind::CapturingToReadPosition);
        match id {
            Some(id) => self.resolve(id, OperationOutcome::Cancelled),
            None => {
                warn!("cancel_capture called with no capture pending");
                false
            }
        }
    }

    pub(crate) fn kind(&self) -> OperationKind {
        self.lock()
            .pending
            .as_ref()
            .map_or(OperationKind::Idle, |pending| pending.kind)
    }

    pub(crate) fn card_present(&self) -> bool {
        self.lock().card_present
    }

    pub(crate) fn last_status(&self) -> Option<StatusFlags> {
        self.lock().last_status
    }

    /// Id of the pending operation if it is of `kind`.
    pub(crate) fn pending_id(&self, kind: OperationKind) -> Option<OperationId> {
        self.lock()
            .pending
            .as_ref()
            .filter(|pending| pending.kind == kind)
            .map(|pending| pending.id)
    }

    /// Id of the pending operation if a reset would abort it.
    pub(crate) fn motion_in_flight(&self) -> Option<OperationId> {
        self.lock()
            .pending
            .as_ref()
            .filter(|pending| pending.kind.is_motion())
            .map(|pending| pending.id)
    }

    /// Command the pending operation still has to send, if any.
    pub(crate) fn take_command(&self) -> Option<Command> {
        self.lock()
            .pending
            .as_mut()
            .and_then(|pending| pending.command.take())
    }

    /// Resolve operation `id` if it is still pending. Its unsent command is
    /// dropped with it.
    pub(crate) fn resolve(&self, id: OperationId, outcome: OperationOutcome) -> bool {
        let mut state = self.lock();
        if state.pending.as_ref().is_none_or(|pending| pending.id != id) {
            return false;
        }
        let Some(pending) = state.pending.take() else {
            return false;
        };
        drop(state);

        info!(
            operation = %pending.kind,
            %outcome,
            elapsed_ms = pending.accepted_at.elapsed().as_millis() as u64,
            "Operation resolved"
        );
        pending.resolve(outcome);
        self.events
            .emit(DispenserEvent::StatusChanged(OperationKind::Idle));
        true
    }

    /// Apply a decoded status frame to the pending operation.
    ///
    /// Operations that only wait for a sensor level resolve here, but never
    /// before their own command has been handed to the link: a frame decoded
    /// earlier answers a poll that was already in flight. When the device has
    /// to act first, the returned follow-up tells the link what to run before
    /// it resolves the operation.
    pub(crate) fn observe(
        &self,
        flags: StatusFlags,
        now: Instant,
        take_wait: Duration,
    ) -> Option<FollowUp> {
        let present = flags.contains(StatusFlag::CaptureSensor1);

        let mut state = self.lock();
        state.last_status = Some(flags);
        state.card_present = present;

        let pending = state.pending.as_mut()?;
        if let Some(command) = pending.command {
            debug!(operation = %pending.kind, %command, "Status ignored, command not sent yet");
            return None;
        }

        let id = pending.id;
        match (pending.kind, present) {
            (OperationKind::CapturingToReadPosition, true)
            | (OperationKind::DispensingToReadPosition, true)
            | (OperationKind::AwaitingSpit, false)
            | (OperationKind::AwaitingStatusQuery, _) => {
                drop(state);
                self.resolve(id, OperationOutcome::Completed);
                None
            }
            (OperationKind::DispensingToExitPosition, true) => {
                pending.kind = OperationKind::AwaitingCardTakeAtExit;
                drop(state);
                debug!("Card at the exit, waiting for it to be taken");
                self.events.emit(DispenserEvent::StatusChanged(
                    OperationKind::AwaitingCardTakeAtExit,
                ));
                None
            }
            (OperationKind::AwaitingCardTakeAtExit, true) => {
                let waited = now.saturating_duration_since(pending.accepted_at);
                (waited > take_wait).then(|| {
                    warn!(waited_ms = waited.as_millis() as u64, "Card not taken in time");
                    FollowUp::Recapture(id)
                })
            }
            (OperationKind::AwaitingCardTakeAtExit, false) => {
                Some(FollowUp::ProhibitThenComplete(id))
            }
            _ => None,
        }
    }

    /// Stop accepting operations and resolve the pending one as abandoned.
    pub(crate) fn abandon(&self) {
        let mut state = self.lock();
        state.stopped = true;
        let pending = state.pending.take();
        drop(state);

        if let Some(pending) = pending {
            info!(operation = %pending.kind, "Operation abandoned on shutdown");
            pending.resolve(OperationOutcome::Abandoned);
            self.events
                .emit(DispenserEvent::StatusChanged(OperationKind::Idle));
        }
    }
}
