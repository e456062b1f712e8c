//! Mock device implementations for testing and development.
//!
//! This module provides a simulated dispenser that can be controlled
//! programmatically without requiring physical hardware.

pub mod device;

pub use device::{MockTransport, MockTransportHandle};
