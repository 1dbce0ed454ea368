//! Frame encoding and decoding
//!
//! A frame is one opcode byte followed by a fixed-width payload. There is no
//! length prefix: the opcode determines the layout, and inbound packets may
//! carry trailing padding up to the endpoint's max packet size.
//!
//! # Frame Format
//!
//! ```text
//! [opcode: u8][field 0][field 1]...
//! ```
//!
//! 16-bit fields are little-endian; UUIDs and state bytes are copied verbatim.

use crate::error::{ProtocolError, Result};
use crate::opcode::{Direction, Opcode};
use crate::types::{Address, AppKeyIndex, DeviceUuid, SceneNumber, StateValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which scene operation a scene message performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneOp {
    Recall,
    Store,
    Delete,
    Bind,
}

impl SceneOp {
    pub const ALL: [SceneOp; 4] = [SceneOp::Recall, SceneOp::Store, SceneOp::Delete, SceneOp::Bind];

    /// Opcode that carries this scene operation
    pub const fn opcode(self) -> Opcode {
        match self {
            SceneOp::Recall => Opcode::SendRecallMessage,
            SceneOp::Store => Opcode::SendStoreMessage,
            SceneOp::Delete => Opcode::SendDeleteMessage,
            SceneOp::Bind => Opcode::SendBindMessage,
        }
    }
}

/// Outbound command (host -> dongle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Create a new mesh network
    Setup,
    /// Generate an application key in the given slot
    AddKey { app_idx: AppKeyIndex },
    /// Provision the unprovisioned device with this UUID
    Provision { uuid: DeviceUuid },
    /// Bind an app key to a freshly provisioned node
    ConfigureNode {
        addr: Address,
        app_idx: AppKeyIndex,
    },
    /// Send a state message to a node or group
    SendMessage {
        state: StateValue,
        addr: Address,
        app_idx: AppKeyIndex,
    },
    /// Erase all mesh data from the controller's flash
    Reset,
    /// Reboot the controller (required after Reset)
    Reboot,
    /// Remove a node from the network
    ResetNode { addr: Address },
    /// Subscribe an element of a node to a group address
    ConfigureElement {
        group_addr: Address,
        node_addr: Address,
        elem_addr: Address,
        app_idx: AppKeyIndex,
    },
    /// Recall, store, delete or bind a scene on a node or group
    Scene {
        op: SceneOp,
        scene: SceneNumber,
        addr: Address,
        app_idx: AppKeyIndex,
    },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Setup => Opcode::Setup,
            Command::AddKey { .. } => Opcode::AddKey,
            Command::Provision { .. } => Opcode::Provision,
            Command::ConfigureNode { .. } => Opcode::ConfigureNode,
            Command::SendMessage { .. } => Opcode::SendMessage,
            Command::Reset => Opcode::Reset,
            Command::Reboot => Opcode::Reboot,
            Command::ResetNode { .. } => Opcode::NodeReset,
            Command::ConfigureElement { .. } => Opcode::ConfigureElement,
            Command::Scene { op, .. } => op.opcode(),
        }
    }

    /// Encode to a wire frame of exactly `opcode().frame_len()` bytes
    pub fn encode(&self) -> Bytes {
        let opcode = self.opcode();
        let mut buf = BytesMut::with_capacity(opcode.frame_len());
        buf.put_u8(opcode.as_byte());

        match *self {
            Command::Setup | Command::Reset | Command::Reboot => {}
            Command::AddKey { app_idx } => buf.put_u16_le(app_idx.0),
            Command::Provision { uuid } => buf.put_slice(uuid.as_bytes()),
            Command::ConfigureNode { addr, app_idx } => {
                buf.put_u16_le(addr.0);
                buf.put_u16_le(app_idx.0);
            }
            Command::SendMessage {
                state,
                addr,
                app_idx,
            } => {
                buf.put_u8(state.0);
                buf.put_u16_le(addr.0);
                buf.put_u16_le(app_idx.0);
            }
            Command::ResetNode { addr } => buf.put_u16_le(addr.0),
            Command::ConfigureElement {
                group_addr,
                node_addr,
                elem_addr,
                app_idx,
            } => {
                buf.put_u16_le(group_addr.0);
                buf.put_u16_le(node_addr.0);
                buf.put_u16_le(elem_addr.0);
                buf.put_u16_le(app_idx.0);
            }
            Command::Scene {
                scene,
                addr,
                app_idx,
                ..
            } => {
                buf.put_u16_le(scene.0);
                buf.put_u16_le(addr.0);
                buf.put_u16_le(app_idx.0);
            }
        }

        debug_assert_eq!(buf.len(), opcode.frame_len());
        buf.freeze()
    }

    /// Decode an outbound frame, e.g. when inspecting captured traffic
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (opcode, mut payload) = split_frame(frame, Direction::Outbound)?;

        let command = match opcode {
            Opcode::Setup => Command::Setup,
            Opcode::Reset => Command::Reset,
            Opcode::Reboot => Command::Reboot,
            Opcode::AddKey => Command::AddKey {
                app_idx: AppKeyIndex(payload.get_u16_le()),
            },
            Opcode::Provision => Command::Provision {
                uuid: get_uuid(&mut payload),
            },
            Opcode::ConfigureNode => Command::ConfigureNode {
                addr: Address(payload.get_u16_le()),
                app_idx: AppKeyIndex(payload.get_u16_le()),
            },
            Opcode::SendMessage => Command::SendMessage {
                state: StateValue(payload.get_u8()),
                addr: Address(payload.get_u16_le()),
                app_idx: AppKeyIndex(payload.get_u16_le()),
            },
            Opcode::NodeReset => Command::ResetNode {
                addr: Address(payload.get_u16_le()),
            },
            Opcode::ConfigureElement => Command::ConfigureElement {
                group_addr: Address(payload.get_u16_le()),
                node_addr: Address(payload.get_u16_le()),
                elem_addr: Address(payload.get_u16_le()),
                app_idx: AppKeyIndex(payload.get_u16_le()),
            },
            Opcode::SendRecallMessage
            | Opcode::SendStoreMessage
            | Opcode::SendDeleteMessage
            | Opcode::SendBindMessage => {
                let op = SceneOp::ALL
                    .into_iter()
                    .find(|op| op.opcode() == opcode)
                    .ok_or(ProtocolError::UnexpectedOpcode {
                        opcode: opcode.as_byte(),
                        expected: "command",
                    })?;
                Command::Scene {
                    op,
                    scene: SceneNumber(payload.get_u16_le()),
                    addr: Address(payload.get_u16_le()),
                    app_idx: AppKeyIndex(payload.get_u16_le()),
                }
            }
            _ => {
                return Err(ProtocolError::UnexpectedOpcode {
                    opcode: opcode.as_byte(),
                    expected: "command",
                });
            }
        };

        Ok(command)
    }
}

/// Inbound notification (dongle -> host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Network created in response to Setup
    SetupStatus,
    /// App key created in response to AddKey
    AddKeyStatus { app_idx: AppKeyIndex },
    /// An unprovisioned device is advertising
    UnprovisionedBeacon { uuid: DeviceUuid },
    /// Provisioning finished and the node was assigned an address
    NodeAdded { addr: Address },
    /// Reserved status, no payload
    ConfigureNodeStatus,
    /// A node reported its current state
    State { addr: Address, state: StateValue },
    /// Reserved status, no payload
    ConfigureElementStatus,
    /// Generic notification from a node
    NodeEvent { addr: Address },
}

impl Event {
    pub fn opcode(&self) -> Opcode {
        match self {
            Event::SetupStatus => Opcode::SetupStatus,
            Event::AddKeyStatus { .. } => Opcode::AddKeyStatus,
            Event::UnprovisionedBeacon { .. } => Opcode::UnprovisionedBeacon,
            Event::NodeAdded { .. } => Opcode::NodeAdded,
            Event::ConfigureNodeStatus => Opcode::ConfigureNodeStatus,
            Event::State { .. } => Opcode::State,
            Event::ConfigureElementStatus => Opcode::ConfigureElementStatus,
            Event::NodeEvent { .. } => Opcode::Event,
        }
    }

    /// Encode the frame the dongle would send for this event
    pub fn encode(&self) -> Bytes {
        let opcode = self.opcode();
        let mut buf = BytesMut::with_capacity(opcode.frame_len());
        buf.put_u8(opcode.as_byte());

        match *self {
            Event::SetupStatus | Event::ConfigureNodeStatus | Event::ConfigureElementStatus => {}
            Event::AddKeyStatus { app_idx } => buf.put_u16_le(app_idx.0),
            Event::UnprovisionedBeacon { uuid } => buf.put_slice(uuid.as_bytes()),
            Event::NodeAdded { addr } | Event::NodeEvent { addr } => buf.put_u16_le(addr.0),
            Event::State { addr, state } => {
                buf.put_u16_le(addr.0);
                buf.put_u8(state.0);
            }
        }

        buf.freeze()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SetupStatus => write!(f, "setup complete"),
            Event::AddKeyStatus { app_idx } => write!(f, "app key {} added", app_idx),
            Event::UnprovisionedBeacon { uuid } => write!(f, "unprovisioned beacon {}", uuid),
            Event::NodeAdded { addr } => write!(f, "node {} added", addr),
            Event::ConfigureNodeStatus => write!(f, "configure node status"),
            Event::State { addr, state } => write!(f, "node {} state {}", addr, state),
            Event::ConfigureElementStatus => write!(f, "configure element status"),
            Event::NodeEvent { addr } => write!(f, "event from node {}", addr),
        }
    }
}

/// Result of classifying an inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Recognised event with its decoded fields
    Event(Event),
    /// Opcode byte that is not an inbound opcode; the frame is ignored
    Unknown { opcode: u8 },
}

/// Classify and decode one inbound packet
///
/// Unknown opcodes (including outbound opcodes echoed back) are a normal
/// outcome, not an error. Bytes past the opcode's payload are ignored.
pub fn decode_inbound(packet: &[u8]) -> Result<Inbound> {
    let first = *packet.first().ok_or(ProtocolError::EmptyFrame)?;
    let opcode = match Opcode::from_byte(first) {
        Some(op) if op.direction() == Direction::Inbound => op,
        _ => return Ok(Inbound::Unknown { opcode: first }),
    };

    let (_, mut payload) = split_frame(packet, Direction::Inbound)?;

    let event = match opcode {
        Opcode::SetupStatus => Event::SetupStatus,
        Opcode::ConfigureNodeStatus => Event::ConfigureNodeStatus,
        Opcode::ConfigureElementStatus => Event::ConfigureElementStatus,
        Opcode::AddKeyStatus => Event::AddKeyStatus {
            app_idx: AppKeyIndex(payload.get_u16_le()),
        },
        Opcode::UnprovisionedBeacon => Event::UnprovisionedBeacon {
            uuid: get_uuid(&mut payload),
        },
        Opcode::NodeAdded => Event::NodeAdded {
            addr: Address(payload.get_u16_le()),
        },
        Opcode::State => Event::State {
            addr: Address(payload.get_u16_le()),
            state: StateValue(payload.get_u8()),
        },
        Opcode::Event => Event::NodeEvent {
            addr: Address(payload.get_u16_le()),
        },
        Opcode::Setup
        | Opcode::AddKey
        | Opcode::Provision
        | Opcode::ConfigureNode
        | Opcode::SendMessage
        | Opcode::Reset
        | Opcode::Reboot
        | Opcode::NodeReset
        | Opcode::ConfigureElement
        | Opcode::SendRecallMessage
        | Opcode::SendStoreMessage
        | Opcode::SendDeleteMessage
        | Opcode::SendBindMessage => {
            unreachable!("outbound opcode {:?} is classified as Unknown above", opcode)
        }
    };

    Ok(Inbound::Event(event))
}

/// Validate the opcode and return exactly the payload bytes it owns
fn split_frame(frame: &[u8], direction: Direction) -> Result<(Opcode, &[u8])> {
    let first = *frame.first().ok_or(ProtocolError::EmptyFrame)?;
    let opcode = Opcode::from_byte(first)
        .filter(|op| op.direction() == direction)
        .ok_or(ProtocolError::UnexpectedOpcode {
            opcode: first,
            expected: match direction {
                Direction::Outbound => "command",
                Direction::Inbound => "event",
            },
        })?;

    if frame.len() < opcode.frame_len() {
        return Err(ProtocolError::Truncated {
            opcode,
            expected: opcode.frame_len(),
            actual: frame.len(),
        });
    }

    Ok((opcode, &frame[1..opcode.frame_len()]))
}

fn get_uuid(payload: &mut &[u8]) -> DeviceUuid {
    let mut uuid = [0u8; DeviceUuid::LEN];
    payload.copy_to_slice(&mut uuid);
    DeviceUuid(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_setup() {
        assert_eq!(Command::Setup.encode().as_ref(), &[0x00]);
        assert_eq!(Command::Reset.encode().as_ref(), &[0x10]);
        assert_eq!(Command::Reboot.encode().as_ref(), &[0x11]);
    }

    #[test]
    fn test_encode_send_message() {
        let frame = Command::SendMessage {
            state: StateValue(0x00),
            addr: Address(0x000A),
            app_idx: AppKeyIndex(0x0000),
        }
        .encode();
        assert_eq!(frame.as_ref(), &[0x09, 0x00, 0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_provision() {
        let mut uuid = [0u8; 16];
        uuid[..6].copy_from_slice(&[0x19, 0x8a, 0x1d, 0x0d, 0x7e, 0xd1]);
        let frame = Command::Provision {
            uuid: DeviceUuid(uuid),
        }
        .encode();

        assert_eq!(frame.len(), 17);
        assert_eq!(frame[0], 0x05);
        assert_eq!(&frame[1..], &uuid);
    }

    #[test]
    fn test_encode_configure_element_field_order() {
        let frame = Command::ConfigureElement {
            group_addr: Address(0xC001),
            node_addr: Address(0x0002),
            elem_addr: Address(0x0003),
            app_idx: AppKeyIndex(0x0104),
        }
        .encode();
        assert_eq!(
            frame.as_ref(),
            &[0x14, 0x01, 0xC0, 0x02, 0x00, 0x03, 0x00, 0x04, 0x01]
        );
    }

    #[test]
    fn test_encode_scene_ops() {
        for (op, byte) in [
            (SceneOp::Recall, 0x16),
            (SceneOp::Store, 0x17),
            (SceneOp::Delete, 0x18),
            (SceneOp::Bind, 0x19),
        ] {
            let frame = Command::Scene {
                op,
                scene: SceneNumber(0x0201),
                addr: Address(0x0403),
                app_idx: AppKeyIndex(0x0605),
            }
            .encode();
            assert_eq!(frame.as_ref(), &[byte, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        }
    }

    #[test]
    fn test_decode_event_frame() {
        let mut packet = vec![0u8; 64];
        packet[0] = 0x20;
        packet[1] = 0x0A;
        packet[2] = 0x00;

        assert_eq!(
            decode_inbound(&packet).unwrap(),
            Inbound::Event(Event::NodeEvent { addr: Address(10) })
        );
    }

    #[test]
    fn test_decode_state_frame() {
        let packet = [0x13, 0x05, 0x00, 0x01, 0xFF, 0xFF];
        assert_eq!(
            decode_inbound(&packet).unwrap(),
            Inbound::Event(Event::State {
                addr: Address(5),
                state: StateValue(1),
            })
        );
    }

    #[test]
    fn test_decode_unknown_opcode() {
        assert_eq!(
            decode_inbound(&[0x7F, 0x01, 0x02]).unwrap(),
            Inbound::Unknown { opcode: 0x7F }
        );
    }

    #[test]
    fn test_decode_outbound_opcode_is_unknown() {
        assert_eq!(
            decode_inbound(&[0x09, 0x00, 0x0A, 0x00, 0x00, 0x00]).unwrap(),
            Inbound::Unknown { opcode: 0x09 }
        );
    }

    #[test]
    fn test_every_outbound_opcode_decodes_as_unknown() {
        for opcode in Opcode::ALL
            .into_iter()
            .filter(|op| op.direction() == Direction::Outbound)
        {
            let mut packet = vec![0u8; 64];
            packet[0] = opcode.as_byte();
            assert_eq!(
                decode_inbound(&packet).unwrap(),
                Inbound::Unknown {
                    opcode: opcode.as_byte()
                }
            );
        }
    }

    #[test]
    fn test_decode_reserved_status_frames() {
        assert_eq!(
            decode_inbound(&[0x08]).unwrap(),
            Inbound::Event(Event::ConfigureNodeStatus)
        );
        assert_eq!(
            decode_inbound(&[0x15, 0x00]).unwrap(),
            Inbound::Event(Event::ConfigureElementStatus)
        );
    }

    #[test]
    fn test_decode_truncated_beacon() {
        let err = decode_inbound(&[0x04, 0x01, 0x02]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                opcode: Opcode::UnprovisionedBeacon,
                expected: 17,
                actual: 3,
            }
        );
    }

    #[test]
    fn test_decode_empty_packet() {
        assert_eq!(decode_inbound(&[]).unwrap_err(), ProtocolError::EmptyFrame);
    }

    #[test]
    fn test_command_decode_rejects_event_opcode() {
        assert!(matches!(
            Command::decode(&[0x01]),
            Err(ProtocolError::UnexpectedOpcode { opcode: 0x01, .. })
        ));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            Event::NodeAdded { addr: Address(8) }.to_string(),
            "node 0x0008 added"
        );
    }
}
