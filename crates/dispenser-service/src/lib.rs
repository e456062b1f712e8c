//! Card dispenser service.
//!
//! Runs the link loop that polls a motorized card dispenser and exposes its
//! high-level operations. One background task owns the transport; callers
//! talk to it through a cloneable [`DispenserHandle`] and observe it through
//! [`DispenserEvent`]s.
//!
//! # Examples
//!
//! ```
//! use dispenser_hardware::mock::MockTransport;
//! use dispenser_protocol::StatusFlag;
//! use dispenser_service::{DispenserConfig, DispenserService, OperationOutcome};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> dispenser_service::Result<()> {
//! let (transport, device) = MockTransport::new();
//! let service = DispenserService::new(DispenserConfig::default(), transport)?;
//! let handle = service.start();
//!
//! let capture = handle.capture_card_to_read();
//! device.insert_flag(StatusFlag::CaptureSensor1);
//!
//! assert_eq!(capture.await, OperationOutcome::Completed);
//! assert!(handle.card_at_read_position());
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod operation;
pub mod recovery;
pub mod resolver;
pub mod service;

mod orchestrator;

pub use config::{DispenserConfig, ErrorMode, LinkTiming};
pub use error::{DispenserError, Result};
pub use events::{DispenserEvent, EventSink, MessageKind};
pub use link::LinkState;
pub use operation::{Completion, OperationKind, OperationOutcome};
pub use recovery::{RecoverySequence, RecoveryStep};
pub use resolver::{FaultScan, Resolver};
pub use service::{DispenserHandle, DispenserService};
