//! Callback-style event routing
//!
//! Consumers that prefer one method per event kind implement [`EventHandler`]
//! and feed decoded events through [`dispatch_event`]. Every method defaults
//! to a no-op, so a handler only overrides the events it cares about.

use crate::codec::Event;
use crate::types::{Address, AppKeyIndex, DeviceUuid, StateValue};

pub trait EventHandler {
    fn on_setup_status(&mut self) {}

    fn on_add_key_status(&mut self, _app_idx: AppKeyIndex) {}

    /// The UUID borrow is only valid for the duration of the call
    fn on_unprovisioned_beacon(&mut self, _uuid: &DeviceUuid) {}

    fn on_node_added(&mut self, _addr: Address) {}

    fn on_state(&mut self, _addr: Address, _state: StateValue) {}

    fn on_event(&mut self, _addr: Address) {}

    fn on_configure_node_status(&mut self) {}

    fn on_configure_element_status(&mut self) {}
}

/// Invoke exactly one handler method for `event`
pub fn dispatch_event<H: EventHandler + ?Sized>(event: &Event, handler: &mut H) {
    match event {
        Event::SetupStatus => handler.on_setup_status(),
        Event::AddKeyStatus { app_idx } => handler.on_add_key_status(*app_idx),
        Event::UnprovisionedBeacon { uuid } => handler.on_unprovisioned_beacon(uuid),
        Event::NodeAdded { addr } => handler.on_node_added(*addr),
        Event::State { addr, state } => handler.on_state(*addr, *state),
        Event::NodeEvent { addr } => handler.on_event(*addr),
        Event::ConfigureNodeStatus => handler.on_configure_node_status(),
        Event::ConfigureElementStatus => handler.on_configure_element_status(),
    }
}
