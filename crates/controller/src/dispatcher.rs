//! Event dispatcher
//!
//! Reads inbound packets, decodes them and delivers events strictly in
//! arrival order. The loop runs either on the caller's thread (`run`,
//! `run_with_handler`) or on a dedicated `mesh-dispatcher` thread that feeds
//! an [`EventStream`](common::EventStream) (`spawn`).
//!
//! Every read is bounded by `read_timeout`, and the stop signal is checked
//! between reads, so a stop request is honoured within one timeout.

use crate::error::{Error, Result};
use crate::issuer::{Sleeper, ThreadSleeper};
use common::{EventSender, Transport, TransportError};
use protocol::{Event, EventHandler, Inbound, decode_inbound, dispatch_event};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Name of the dispatcher thread
pub const DISPATCHER_THREAD_NAME: &str = "mesh-dispatcher";

/// Default pause after a transient read error
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How often a blocked delivery re-checks the stop signal
const DELIVERY_POLL: Duration = Duration::from_millis(5);

/// Shared flag asking a dispatcher loop to exit
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one dispatcher run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Packets read from the transport
    pub frames: u64,
    /// Events handed to the consumer
    pub delivered: u64,
    /// Packets with an opcode that is not an inbound opcode
    pub unknown: u64,
    /// Known opcodes whose packet was too short (or empty packets)
    pub malformed: u64,
    /// Non-fatal read errors
    pub transient_errors: u64,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    read_timeout: Duration,
    error_backoff: Duration,
    stop: StopSignal,
    sleeper: Arc<dyn Sleeper>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, read_timeout: Duration) -> Self {
        Self {
            transport,
            read_timeout,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            stop: StopSignal::new(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Signal that ends this dispatcher's loop
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run the loop on the current thread until stopped
    ///
    /// `deliver` is called once per event, in arrival order; returning
    /// `ControlFlow::Break` ends the loop normally. Returns `Err` only for a
    /// fatal transport error.
    pub fn run<F>(&self, mut deliver: F) -> Result<DispatchStats>
    where
        F: FnMut(Event) -> ControlFlow<()>,
    {
        self.run_until(&mut deliver, || false)
    }

    /// Run the loop, routing each event to one `EventHandler` method
    pub fn run_with_handler<H: EventHandler + ?Sized>(
        &self,
        handler: &mut H,
    ) -> Result<DispatchStats> {
        self.run(|event| {
            dispatch_event(&event, handler);
            ControlFlow::Continue(())
        })
    }

    /// Move the loop onto the `mesh-dispatcher` thread, delivering into `sender`
    ///
    /// The thread exits when stopped, when every `EventStream` is dropped, or
    /// on a fatal transport error. A stop request is honoured even while the
    /// channel is full and nobody is reading.
    pub fn spawn(self, sender: EventSender) -> Result<DispatcherHandle> {
        let stop = self.stop.clone();

        let thread = std::thread::Builder::new()
            .name(DISPATCHER_THREAD_NAME.to_string())
            .spawn(move || {
                // A full channel must not hide a stop request
                let cancelled = || self.stop.is_stopped();
                let mut deliver = |event: Event| {
                    let queued = sender.send_cancellable(event, &cancelled, DELIVERY_POLL);
                    match queued {
                        Ok(true) => ControlFlow::Continue(()),
                        Ok(false) => {
                            debug!("Stop requested with {:?} undelivered", event);
                            ControlFlow::Break(())
                        }
                        Err(_) => {
                            debug!("Event stream dropped");
                            ControlFlow::Break(())
                        }
                    }
                };
                self.run_until(&mut deliver, || sender.is_closed())
            })
            .map_err(Error::Spawn)?;

        Ok(DispatcherHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn run_until<F, C>(&self, deliver: &mut F, closed: C) -> Result<DispatchStats>
    where
        F: FnMut(Event) -> ControlFlow<()>,
        C: Fn() -> bool,
    {
        info!("Event dispatcher started");
        let mut stats = DispatchStats::default();

        let outcome = loop {
            if self.stop.is_stopped() {
                debug!("Stop requested");
                break Ok(());
            }
            if closed() {
                debug!("No consumers left");
                break Ok(());
            }

            let packet = match self.transport.receive(self.read_timeout) {
                Ok(packet) => packet,
                Err(TransportError::Timeout) => continue,
                Err(e) if e.is_fatal() => {
                    error!("Fatal read error: {}", e);
                    break Err(Error::Transport(e));
                }
                Err(e) => {
                    stats.transient_errors += 1;
                    warn!(
                        "Read error: {} ({} so far), retrying in {:?}",
                        e, stats.transient_errors, self.error_backoff
                    );
                    self.sleeper.sleep(self.error_backoff);
                    continue;
                }
            };

            stats.frames += 1;
            match decode_inbound(&packet) {
                Ok(Inbound::Event(event)) => {
                    trace!("Received {:?}", event);
                    stats.delivered += 1;
                    if deliver(event).is_break() {
                        break Ok(());
                    }
                }
                Ok(Inbound::Unknown { opcode }) => {
                    stats.unknown += 1;
                    debug!("Ignoring frame with unknown opcode {:#04x}", opcode);
                }
                Err(e) => {
                    stats.malformed += 1;
                    warn!("Dropping malformed frame: {}", e);
                }
            }
        };

        info!(
            "Event dispatcher stopped: {} frames, {} delivered, {} unknown, {} malformed, {} read errors",
            stats.frames, stats.delivered, stats.unknown, stats.malformed, stats.transient_errors
        );
        outcome.map(|()| stats)
    }
}

/// Running `mesh-dispatcher` thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct DispatcherHandle {
    stop: StopSignal,
    thread: Option<JoinHandle<Result<DispatchStats>>>,
}

impl DispatcherHandle {
    /// Ask the loop to exit after the current read
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Whether the thread has exited (stopped, stream dropped, or failed)
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Wait for the thread to exit and return its outcome
    pub fn join(mut self) -> Result<DispatchStats> {
        self.join_inner()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(self) -> Result<DispatchStats> {
        self.stop();
        self.join()
    }

    fn join_inner(&mut self) -> Result<DispatchStats> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::DispatcherPanicked)?,
            None => Ok(DispatchStats::default()),
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            if let Err(e) = self.join_inner() {
                warn!("Dispatcher ended with error: {}", e);
            }
        }
    }
}
