//! Observer notifications.
//!
//! Events fan out over a broadcast channel. Publishing never blocks and never
//! fails: with no subscribers, or with a lagging one, events are dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::operation::OperationKind;

/// Capacity of the event channel before slow subscribers start lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Warning,
    Error,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Notification published by the dispenser service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DispenserEvent {
    /// The pending operation changed kind.
    StatusChanged(OperationKind),

    /// A device warning or fault was raised. `text` is the flag name.
    Message { kind: MessageKind, text: String },

    /// The link failed, or a fault was raised in best-effort mode.
    Exception { error: String },

    /// The link is usable again after a failure.
    ExceptionCleared,
}

/// Sending side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<DispenserEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispenserEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DispenserEvent) {
        trace!(?event, "Publishing event");
        let _ = self.tx.send(event);
    }

    pub fn message(&self, kind: MessageKind, text: impl Into<String>) {
        self.emit(DispenserEvent::Message {
            kind,
            text: text.into(),
        });
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new();
        sink.emit(DispenserEvent::ExceptionCleared);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();

        sink.emit(DispenserEvent::StatusChanged(OperationKind::AwaitingSpit));
        sink.message(MessageKind::Warning, "CardPreEmpty");

        assert_eq!(
            rx.try_recv().unwrap(),
            DispenserEvent::StatusChanged(OperationKind::AwaitingSpit)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            DispenserEvent::Message {
                kind: MessageKind::Warning,
                text: "CardPreEmpty".into()
            }
        );
    }
}
