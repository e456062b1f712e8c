//! Public service and handle.

use std::sync::{Arc, Mutex, PoisonError};

use dispenser_hardware::{SerialTransport, Transport};
use dispenser_protocol::{StatusFlag, StatusFlags};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::DispenserConfig;
use crate::error::Result;
use crate::events::{DispenserEvent, EventSink};
use crate::link::Link;
use crate::operation::{Completion, OperationKind};
use crate::orchestrator::Orchestrator;

/// A configured dispenser that has not started talking to the device yet.
///
/// # Lifecycle
///
/// 1. Create the service with a configuration and a transport
/// 2. Optionally subscribe to events, so none are missed
/// 3. Call `start()` to spawn the link loop and get a handle
/// 4. Issue operations through the handle
/// 5. Call `shutdown()` on the handle to stop the loop and close the port
pub struct DispenserService<T: Transport> {
    config: DispenserConfig,
    transport: T,
    orchestrator: Arc<Orchestrator>,
    events: EventSink,
}

impl<T: Transport> DispenserService<T> {
    /// Create a service over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: DispenserConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let events = EventSink::new();
        Ok(Self {
            config,
            transport,
            orchestrator: Arc::new(Orchestrator::new(events.clone())),
            events,
        })
    }

    pub fn config(&self) -> &DispenserConfig {
        &self.config
    }

    /// Subscribe to events before the link starts.
    pub fn subscribe(&self) -> broadcast::Receiver<DispenserEvent> {
        self.events.subscribe()
    }

    /// Spawn the link loop on the current Tokio runtime.
    pub fn start(self) -> DispenserHandle {
        let shutdown = CancellationToken::new();
        let link = Link::new(
            self.transport,
            self.config,
            Arc::clone(&self.orchestrator),
            self.events.clone(),
            shutdown.clone(),
        );
        let task = tokio::spawn(link.run());

        DispenserHandle {
            inner: Arc::new(HandleInner {
                orchestrator: self.orchestrator,
                events: self.events,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

impl DispenserService<SerialTransport> {
    /// Create a service over the serial port named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn serial(config: DispenserConfig) -> Result<Self> {
        let transport = SerialTransport::new(config.serial.clone());
        Self::new(config, transport)
    }
}

#[derive(Debug)]
struct HandleInner {
    orchestrator: Arc<Orchestrator>,
    events: EventSink,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running dispenser service.
///
/// Cheap to clone. Operations return immediately with a [`Completion`]; at
/// most one operation is in flight and any other request resolves as
/// [`Rejected`](crate::OperationOutcome::Rejected) without touching the
/// device.
#[derive(Debug, Clone)]
pub struct DispenserHandle {
    inner: Arc<HandleInner>,
}

impl DispenserHandle {
    /// Set the capture policy to read and wait for an inserted card to reach
    /// the reader.
    pub fn capture_card_to_read(&self) -> Completion {
        self.inner.orchestrator.capture_card_to_read()
    }

    /// Dispense a card from the stacker to the reader.
    pub fn dispense_card_to_read(&self) -> Completion {
        self.inner.orchestrator.dispense_card_to_read()
    }

    /// Dispense a card to the exit and wait for it to be taken.
    ///
    /// The take wait is counted from this call. A card still at the exit
    /// when it runs out is captured to the error bin and the operation
    /// resolves as
    /// [`Recaptured`](crate::OperationOutcome::Recaptured).
    pub fn dispense_card_to_exit(&self) -> Completion {
        self.inner.orchestrator.dispense_card_to_exit()
    }

    /// Resolve once the next status frame has been decoded.
    pub fn get_status(&self) -> Completion {
        self.inner.orchestrator.get_status()
    }

    /// Push the card at the reader out of the front. Resolves immediately
    /// when there is no card.
    pub fn spit_card(&self) -> Completion {
        self.inner.orchestrator.spit_card()
    }

    /// Cancel a pending capture. Returns `false` if no capture is pending.
    pub fn cancel_capture(&self) -> bool {
        self.inner.orchestrator.cancel_capture()
    }

    /// Kind of the operation in flight.
    pub fn status(&self) -> OperationKind {
        self.inner.orchestrator.kind()
    }

    /// Whether the last status frame reported a card at the reader.
    pub fn card_at_read_position(&self) -> bool {
        self.inner.orchestrator.card_present()
    }

    pub fn last_status(&self) -> Option<StatusFlags> {
        self.inner.orchestrator.last_status()
    }

    /// Whether the last status frame reported an empty stacker.
    pub fn is_stacker_empty(&self) -> bool {
        self.last_status()
            .is_some_and(|flags| flags.contains(StatusFlag::CardEmpty))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispenserEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.shutdown.is_cancelled()
    }

    /// Stop the link loop and close the transport.
    ///
    /// The pending operation, if any, resolves as
    /// [`Abandoned`](crate::OperationOutcome::Abandoned), as does every
    /// operation requested afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(err) = task.await
            && err.is_panic()
        {
            error!("Dispenser link task panicked");
        }

        self.inner.orchestrator.abandon();
    }
}
