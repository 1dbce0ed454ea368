//! Wire protocol for the Bluetooth-mesh control dongle
//!
//! The dongle exchanges small fixed-layout frames over two USB bulk endpoints.
//! This crate maps typed commands to outbound frames and inbound frames to
//! typed events. It performs no I/O.
//!
//! # Example
//!
//! ```
//! use protocol::{Address, AppKeyIndex, Command, StateValue};
//!
//! let frame = Command::SendMessage {
//!     state: StateValue(0x00),
//!     addr: Address(0x000A),
//!     app_idx: AppKeyIndex(0x0000),
//! }
//! .encode();
//! assert_eq!(frame.as_ref(), &[0x09, 0x00, 0x0A, 0x00, 0x00, 0x00]);
//! ```
//!
//! # Decoding
//!
//! Inbound packets are padded to the endpoint's max packet size; anything
//! after the opcode's payload is ignored.
//!
//! ```
//! use protocol::{Address, Event, Inbound, decode_inbound};
//!
//! let mut packet = [0u8; 64];
//! packet[..3].copy_from_slice(&[0x06, 0x08, 0x00]);
//! assert_eq!(
//!     decode_inbound(&packet).unwrap(),
//!     Inbound::Event(Event::NodeAdded { addr: Address(8) })
//! );
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod opcode;
pub mod types;

pub use codec::{Command, Event, Inbound, SceneOp, decode_inbound};
pub use error::{ProtocolError, Result};
pub use handler::{EventHandler, dispatch_event};
pub use opcode::{Direction, MAX_FRAME_LEN, Opcode};
pub use types::{Address, AppKeyIndex, DeviceUuid, SceneNumber, StateValue};
