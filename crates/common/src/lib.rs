//! Common utilities for the mesh controller driver
//!
//! This crate provides the pieces shared by the driver and its tests: the
//! `Transport` abstraction, the event channel that carries decoded events
//! off the dispatcher thread, error handling, and logging setup.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod transport;

pub use channel::{DEFAULT_EVENT_CAPACITY, EventSender, EventStream, create_event_channel};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use transport::{Transport, TransportError};
