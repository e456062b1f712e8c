//! Transport layer for the card dispenser.
//!
//! The dispenser is reached over a byte-oriented serial link. This crate
//! defines the [`Transport`] trait the link loop is written against, a
//! [`SerialTransport`] over a native RS-232 port and a scriptable
//! [`MockTransport`](mock::MockTransport) for tests and development.
//!
//! # Design Philosophy
//!
//! - **Async-first**: every I/O operation is a future; blocking serial calls
//!   run on Tokio's blocking pool.
//! - **Spawnable**: trait futures are `Send` so a generic link loop can be
//!   handed to `tokio::spawn`.
//! - **Error-aware**: all operations return [`Result<T>`] with a
//!   [`HardwareError`] describing the link failure.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::{HardwareError, Result};
pub use serial::SerialTransport;
pub use traits::Transport;
