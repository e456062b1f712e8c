//! Common helpers for dispenser service integration tests.
//!
//! Tests run on a paused Tokio clock, so the 200 ms link ticks and the
//! multi-second recovery delays advance instantly once every task is idle.

#![allow(dead_code)]

use std::time::Duration;

use dispenser_hardware::mock::{MockTransport, MockTransportHandle};
use dispenser_service::{
    DispenserConfig, DispenserEvent, DispenserHandle, DispenserService, ErrorMode,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::EnvFilter;

/// Virtual time a condition may take before the test fails.
pub const WAIT_LIMIT: Duration = Duration::from_secs(120);

/// Install a test log writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub handle: DispenserHandle,
    pub device: MockTransportHandle,
    pub events: broadcast::Receiver<DispenserEvent>,
}

impl Harness {
    /// Every event published so far.
    pub fn drain_events(&mut self) -> Vec<DispenserEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return drained,
            }
        }
    }
}

pub fn config(mode: ErrorMode) -> DispenserConfig {
    DispenserConfig::new("mock").with_error_mode(mode)
}

/// Start a service over a fresh mock device.
pub fn start(config: DispenserConfig) -> Harness {
    start_with(config, |_| {})
}

/// Start a service after scripting the mock device.
pub fn start_with(config: DispenserConfig, script: impl FnOnce(&MockTransportHandle)) -> Harness {
    init_tracing();
    let (transport, device) = MockTransport::new();
    script(&device);

    let service = DispenserService::new(config, transport).unwrap();
    let events = service.subscribe();
    Harness {
        handle: service.start(),
        device,
        events,
    }
}

/// Wait on the paused clock until `condition` holds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let polled = tokio::time::timeout(WAIT_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

/// Let the link run for `duration` of virtual time.
pub async fn run_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}
