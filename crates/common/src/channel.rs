//! Event channel between the dispatcher thread and its consumers
//!
//! The dispatcher runs on a plain OS thread and pushes decoded events with a
//! blocking send. Consumers may read them from async code (`recv`) or from
//! another thread (`recv_blocking`). The channel is bounded, so a slow
//! consumer applies backpressure instead of events being dropped.

use async_channel::{Receiver, Sender, TrySendError, bounded};
use protocol::Event;
use std::time::Duration;

/// Default number of undelivered events buffered before the dispatcher blocks
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Dispatcher side of the channel (blocking)
#[derive(Debug)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Deliver an event, blocking while the channel is full
    ///
    /// Fails once every `EventStream` has been dropped.
    pub fn send(&self, event: Event) -> crate::Result<()> {
        self.tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Deliver an event, waiting while the channel is full until `cancelled` fires
    ///
    /// Polls every `poll` while full. Returns `Ok(false)` if cancelled before
    /// the event was queued; the event is then discarded.
    pub fn send_cancellable<C>(
        &self,
        event: Event,
        cancelled: C,
        poll: Duration,
    ) -> crate::Result<bool>
    where
        C: Fn() -> bool,
    {
        let mut pending = event;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(true),
                Err(TrySendError::Closed(_)) => {
                    return Err(crate::Error::Channel("Event stream closed".to_string()));
                }
                Err(TrySendError::Full(returned)) => {
                    if cancelled() {
                        return Ok(false);
                    }
                    pending = returned;
                    std::thread::sleep(poll);
                }
            }
        }
    }

    /// Whether all consumers have gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the channel
#[derive(Debug, Clone)]
pub struct EventStream {
    rx: Receiver<Event>,
}

impl EventStream {
    /// Receive the next event
    ///
    /// Fails once the dispatcher has stopped and the buffer is drained.
    pub async fn recv(&self) -> crate::Result<Event> {
        self.rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive the next event from a non-async context (blocking)
    pub fn recv_blocking(&self) -> crate::Result<Event> {
        self.rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Number of events waiting to be read
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create the event channel
///
/// Returns (EventSender for the dispatcher, EventStream for consumers)
pub fn create_event_channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = bounded(capacity.max(1));
    (EventSender { tx }, EventStream { rx })
}
