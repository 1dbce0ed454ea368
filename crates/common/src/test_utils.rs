//! Test utilities for the mesh controller crates
//!
//! Provides a scripted in-memory transport and helper functions for testing
//! the issuer and dispatcher without hardware.
//!
//! # Example
//!
//! ```
//! use common::Transport;
//! use common::test_utils::ScriptedTransport;
//! use protocol::Event;
//! use std::time::Duration;
//!
//! let transport = ScriptedTransport::new();
//! transport.push_event(Event::SetupStatus);
//!
//! let packet = transport.receive(Duration::from_millis(10)).unwrap();
//! assert_eq!(packet[0], 0x01);
//! assert_eq!(packet.len(), transport.max_packet_size());
//! ```

use crate::transport::{Transport, TransportError};
use protocol::Event;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Max packet size reported by the mock (full-speed bulk endpoint)
pub const MOCK_MAX_PACKET_SIZE: usize = 64;

/// Longest time an idle `receive` sleeps before reporting a timeout
const IDLE_POLL: Duration = Duration::from_millis(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory transport driven by a script
///
/// - Inbound packets (or read errors) are queued with `push_*` and returned
///   by `receive` in order. An empty queue behaves like a read timeout.
/// - Send outcomes are queued with `fail_next_sends`/`push_send_result`; once
///   the queue is empty every send succeeds.
/// - Every frame passed to `send` is recorded, whether or not it "failed".
pub struct ScriptedTransport {
    inbound: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    send_results: Mutex<VecDeque<Result<(), TransportError>>>,
    sent: Mutex<Vec<Vec<u8>>>,
    receive_calls: AtomicUsize,
    max_packet_size: usize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_max_packet_size(MOCK_MAX_PACKET_SIZE)
    }

    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            receive_calls: AtomicUsize::new(0),
            max_packet_size,
        }
    }

    /// Queue a raw inbound packet, zero-padded to the max packet size
    pub fn push_packet(&self, bytes: &[u8]) {
        let mut packet = bytes.to_vec();
        if packet.len() < self.max_packet_size {
            packet.resize(self.max_packet_size, 0);
        }
        lock(&self.inbound).push_back(Ok(packet));
    }

    /// Queue a raw inbound packet exactly as given (no padding)
    pub fn push_raw(&self, bytes: Vec<u8>) {
        lock(&self.inbound).push_back(Ok(bytes));
    }

    /// Queue the frame the dongle would send for `event`
    pub fn push_event(&self, event: Event) {
        self.push_packet(&event.encode());
    }

    /// Queue a read error
    pub fn push_read_error(&self, error: TransportError) {
        lock(&self.inbound).push_back(Err(error));
    }

    /// Queue the outcome of the next `send`
    pub fn push_send_result(&self, result: Result<(), TransportError>) {
        lock(&self.send_results).push_back(result);
    }

    /// Make the next `count` sends fail with `error`
    pub fn fail_next_sends(&self, count: usize, error: TransportError) {
        let mut results = lock(&self.send_results);
        for _ in 0..count {
            results.push_back(Err(error.clone()));
        }
    }

    /// Every frame passed to `send`, in call order
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }

    /// Number of `send` calls made so far
    pub fn send_attempts(&self) -> usize {
        lock(&self.sent).len()
    }

    /// Number of `receive` calls made so far
    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    /// Inbound packets not yet consumed
    pub fn pending_inbound(&self) -> usize {
        lock(&self.inbound).len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        lock(&self.sent).push(frame.to_vec());
        lock(&self.send_results).pop_front().unwrap_or(Ok(()))
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.inbound).pop_front();
        match next {
            Some(result) => result,
            None => {
                std::thread::sleep(timeout.min(IDLE_POLL));
                Err(TransportError::Timeout)
            }
        }
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let event = with_timeout(DEFAULT_TEST_TIMEOUT, stream.recv()).await.unwrap();
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sends_succeed_after_script_runs_out() {
        let transport = ScriptedTransport::new();
        transport.fail_next_sends(1, TransportError::Io);

        assert_eq!(transport.send(&[0x00]), Err(TransportError::Io));
        assert_eq!(transport.send(&[0x00]), Ok(()));
        assert_eq!(transport.send_attempts(), 2);
    }

    #[test]
    fn test_empty_inbound_times_out() {
        let transport = ScriptedTransport::new();
        assert_eq!(
            transport.receive(Duration::from_millis(1)),
            Err(TransportError::Timeout)
        );
        assert_eq!(transport.receive_calls(), 1);
    }

    #[test]
    fn test_push_raw_is_not_padded() {
        let transport = ScriptedTransport::new();
        transport.push_raw(vec![0x04, 0x01]);
        assert_eq!(
            transport.receive(Duration::from_millis(1)).unwrap(),
            vec![0x04, 0x01]
        );
    }
}
