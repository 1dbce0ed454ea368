//! Byte transport between the host and the mesh controller
//!
//! The dongle exposes one bulk endpoint per direction. Implementations must
//! allow `send` and `receive` to run concurrently from different threads,
//! since the dispatcher blocks in `receive` while commands are being sent.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No packet arrived (or the write did not complete) within the timeout
    #[error("Transfer timed out")]
    Timeout,

    /// The device is gone; no further transfers can succeed
    #[error("Device disconnected")]
    Disconnected,

    #[error("Buffer overflow")]
    Overflow,

    #[error("I/O error")]
    Io,

    #[error("Endpoint stalled")]
    Pipe,

    #[error("Transfer interrupted")]
    Interrupted,

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the error ends the session (as opposed to a per-transfer fault)
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Disconnected)
    }
}

/// Blocking packet transport over two fixed channels
pub trait Transport: Send + Sync {
    /// Write one complete frame to the OUT endpoint
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Read one packet (up to `max_packet_size` bytes) from the IN endpoint
    ///
    /// Returns `TransportError::Timeout` if nothing arrives within `timeout`.
    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Size of the buffer each `receive` reads into
    fn max_packet_size(&self) -> usize;
}
