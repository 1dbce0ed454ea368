//! Command issuer
//!
//! One method per outbound command. Each method encodes its frame and hands
//! it to the transport under a bounded retry policy. Reads are never retried.

use crate::error::{Error, Result};
use common::{Transport, TransportError};
use protocol::{Address, AppKeyIndex, Command, DeviceUuid, SceneNumber, SceneOp, StateValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times a frame write is attempted, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    /// Two attempts, 200 ms apart
    fn default() -> Self {
        Self::new(2, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

/// Blocking delay between retries
///
/// Injected so tests can record the backoff instead of waiting for it.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Builds command frames and writes them with retry
///
/// Cheap to clone; clones share the transport. Concurrent callers are not
/// ordered relative to each other.
#[derive(Clone)]
pub struct CommandIssuer {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl CommandIssuer {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, policy, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Write one raw frame, retrying per the policy
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        let attempts = self.policy.attempts();
        let mut last_error = TransportError::Other("no write attempted".to_string());

        for attempt in 1..=attempts {
            match self.transport.send(frame) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("Write succeeded on attempt {}", attempt);
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < attempts {
                        warn!(
                            "Write attempt {}/{} failed: {}, retrying in {:?}",
                            attempt,
                            attempts,
                            e,
                            self.policy.backoff()
                        );
                        self.sleeper.sleep(self.policy.backoff());
                    }
                    last_error = e;
                }
            }
        }

        Err(Error::WriteFailed {
            attempts,
            source: last_error,
        })
    }

    /// Encode and write a command
    pub fn issue(&self, command: &Command) -> Result<()> {
        let frame = command.encode();
        debug!("Issuing {:?} ({} bytes)", command, frame.len());
        self.send(&frame).inspect_err(|e| warn!("{:?} not sent: {}", command, e))
    }

    pub fn setup(&self) -> Result<()> {
        self.issue(&Command::Setup)
    }

    pub fn add_key(&self, app_idx: AppKeyIndex) -> Result<()> {
        self.issue(&Command::AddKey { app_idx })
    }

    pub fn provision(&self, uuid: DeviceUuid) -> Result<()> {
        self.issue(&Command::Provision { uuid })
    }

    pub fn configure_node(&self, addr: Address, app_idx: AppKeyIndex) -> Result<()> {
        self.issue(&Command::ConfigureNode { addr, app_idx })
    }

    pub fn configure_element(
        &self,
        group_addr: Address,
        node_addr: Address,
        elem_addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issue(&Command::ConfigureElement {
            group_addr,
            node_addr,
            elem_addr,
            app_idx,
        })
    }

    pub fn send_message(
        &self,
        state: StateValue,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issue(&Command::SendMessage {
            state,
            addr,
            app_idx,
        })
    }

    /// Any of the four scene operations
    pub fn scene(
        &self,
        op: SceneOp,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issue(&Command::Scene {
            op,
            scene,
            addr,
            app_idx,
        })
    }

    pub fn send_recall_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.scene(SceneOp::Recall, scene, addr, app_idx)
    }

    pub fn send_store_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.scene(SceneOp::Store, scene, addr, app_idx)
    }

    pub fn send_delete_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.scene(SceneOp::Delete, scene, addr, app_idx)
    }

    pub fn send_bind_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.scene(SceneOp::Bind, scene, addr, app_idx)
    }

    pub fn reset_node(&self, addr: Address) -> Result<()> {
        self.issue(&Command::ResetNode { addr })
    }

    /// Erase the controller's mesh data; follow with `reboot`
    pub fn reset(&self) -> Result<()> {
        self.issue(&Command::Reset)
    }

    pub fn reboot(&self) -> Result<()> {
        self.issue(&Command::Reboot)
    }
}
