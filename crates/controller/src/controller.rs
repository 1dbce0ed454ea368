//! Controller facade
//!
//! Owns the transport and hands controller-internal shares of it to the
//! command issuer and the event dispatcher.

use crate::config::ControllerConfig;
use crate::dispatcher::{DispatchStats, Dispatcher, DispatcherHandle, StopSignal};
use crate::error::{Error, Result};
use crate::issuer::{CommandIssuer, Sleeper};
use crate::usb::UsbTransport;
use common::{EventStream, Transport, create_event_channel};
use protocol::{Address, AppKeyIndex, DeviceUuid, SceneNumber, StateValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Controller {
    transport: Arc<dyn Transport>,
    issuer: CommandIssuer,
    sleeper: Option<Arc<dyn Sleeper>>,
    read_timeout: Duration,
    error_backoff: Duration,
    channel_capacity: usize,
    listener: Option<DispatcherHandle>,
}

impl Controller {
    /// Open the dongle described by `config.device`
    pub fn open(config: &ControllerConfig) -> Result<Self> {
        let transport = UsbTransport::open(&config.device)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Build a controller over an already open transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: &ControllerConfig) -> Self {
        let issuer = CommandIssuer::new(transport.clone(), config.retry.policy());
        Self {
            transport,
            issuer,
            sleeper: None,
            read_timeout: config.device.read_timeout(),
            error_backoff: config.listen.error_backoff(),
            channel_capacity: config.listen.channel_capacity,
            listener: None,
        }
    }

    /// Replace the delay used by write retries and read-error backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.issuer = CommandIssuer::with_sleeper(
            self.transport.clone(),
            self.issuer.policy(),
            sleeper.clone(),
        );
        self.sleeper = Some(sleeper);
        self
    }

    /// Issuer sharing this controller's transport; may be cloned onto other threads
    ///
    /// A clone keeps the transport open after the controller is dropped, and
    /// writes from it race with writes made through the controller.
    pub fn issuer(&self) -> &CommandIssuer {
        &self.issuer
    }

    /// A dispatcher over this controller's transport, for running on the caller's thread
    ///
    /// Fails with `AlreadyListening` while `listen` is active, since both would
    /// read the same endpoint.
    pub fn dispatcher(&self) -> Result<Dispatcher> {
        if self.is_listening() {
            return Err(Error::AlreadyListening);
        }
        Ok(self.build_dispatcher())
    }

    fn build_dispatcher(&self) -> Dispatcher {
        let dispatcher = Dispatcher::new(self.transport.clone(), self.read_timeout)
            .with_error_backoff(self.error_backoff);
        match &self.sleeper {
            Some(sleeper) => dispatcher.with_sleeper(sleeper.clone()),
            None => dispatcher,
        }
    }

    /// Start the `mesh-dispatcher` thread and return the stream it feeds
    pub fn listen(&mut self) -> Result<EventStream> {
        if let Some(listener) = self.listener.take() {
            if !listener.is_finished() {
                self.listener = Some(listener);
                return Err(Error::AlreadyListening);
            }
            // Reap the previous run before starting another
            if let Err(e) = listener.join() {
                warn!("Previous dispatcher ended with error: {}", e);
            }
        }

        let (sender, stream) = create_event_channel(self.channel_capacity);
        self.listener = Some(self.build_dispatcher().spawn(sender)?);
        info!("Listening for mesh events");
        Ok(stream)
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| !l.is_finished())
    }

    /// Stop signal of the running listener, if any
    pub fn stop_signal(&self) -> Option<StopSignal> {
        self.listener.as_ref().map(DispatcherHandle::stop_signal)
    }

    /// Ask the listener to stop without waiting for it
    pub fn stop(&self) {
        if let Some(listener) = &self.listener {
            listener.stop();
        }
    }

    /// Stop the listener, wait for it, and report how it ended
    ///
    /// Returns the fatal transport error if the listener died on one.
    pub fn shutdown(&mut self) -> Result<DispatchStats> {
        match self.listener.take() {
            Some(listener) => listener.shutdown(),
            None => Ok(DispatchStats::default()),
        }
    }

    pub fn setup(&self) -> Result<()> {
        self.issuer.setup()
    }

    pub fn add_key(&self, app_idx: AppKeyIndex) -> Result<()> {
        self.issuer.add_key(app_idx)
    }

    pub fn provision(&self, uuid: DeviceUuid) -> Result<()> {
        self.issuer.provision(uuid)
    }

    pub fn configure_node(&self, addr: Address, app_idx: AppKeyIndex) -> Result<()> {
        self.issuer.configure_node(addr, app_idx)
    }

    pub fn configure_element(
        &self,
        group_addr: Address,
        node_addr: Address,
        elem_addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.configure_element(group_addr, node_addr, elem_addr, app_idx)
    }

    pub fn send_message(
        &self,
        state: StateValue,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.send_message(state, addr, app_idx)
    }

    pub fn send_recall_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.send_recall_message(scene, addr, app_idx)
    }

    pub fn send_store_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.send_store_message(scene, addr, app_idx)
    }

    pub fn send_delete_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.send_delete_message(scene, addr, app_idx)
    }

    pub fn send_bind_message(
        &self,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    ) -> Result<()> {
        self.issuer.send_bind_message(scene, addr, app_idx)
    }

    pub fn reset_node(&self, addr: Address) -> Result<()> {
        self.issuer.reset_node(addr)
    }

    pub fn reset(&self) -> Result<()> {
        self.issuer.reset()
    }

    pub fn reboot(&self) -> Result<()> {
        self.issuer.reboot()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take()
            && let Err(e) = listener.shutdown()
        {
            warn!("Dispatcher ended with error: {}", e);
        }
    }
}
