//! Host-side driver for the Bluetooth-mesh controller dongle
//!
//! [`Controller`] opens the dongle over USB and exposes one method per mesh
//! command. Inbound events are read on a dedicated thread and delivered
//! through an [`EventStream`](common::EventStream), or routed to an
//! [`EventHandler`](protocol::EventHandler) on the caller's thread.
//!
//! ```no_run
//! use mesh_controller::{Controller, ControllerConfig};
//! use protocol::{Address, AppKeyIndex, StateValue};
//!
//! # fn main() -> mesh_controller::Result<()> {
//! let config = ControllerConfig::default();
//! let mut controller = Controller::open(&config)?;
//! let events = controller.listen()?;
//!
//! controller.setup()?;
//! controller.send_message(StateValue(1), Address(0x000A), AppKeyIndex(0))?;
//!
//! while let Ok(event) = events.recv_blocking() {
//!     println!("{}", event);
//! }
//! controller.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod issuer;
pub mod responder;
pub mod usb;

pub use config::{ControllerConfig, DeviceSettings, ListenSettings, RetrySettings, load_config};
pub use controller::Controller;
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherHandle, StopSignal};
pub use error::{Error, OpenError, Result};
pub use issuer::{CommandIssuer, RetryPolicy, Sleeper, ThreadSleeper};
pub use responder::AutoResponder;
pub use usb::UsbTransport;
