//! Opcode table
//!
//! Every frame starts with a one-byte opcode. The opcode alone determines
//! the payload layout, so each opcode also fixes the frame length.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction a frame travels relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Host to dongle (bulk OUT)
    Outbound,
    /// Dongle to host (bulk IN)
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("command"),
            Direction::Inbound => f.write_str("event"),
        }
    }
}

/// Wire opcodes understood by the mesh controller firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Opcode {
    Setup = 0x00,
    SetupStatus = 0x01,
    AddKey = 0x02,
    AddKeyStatus = 0x03,
    UnprovisionedBeacon = 0x04,
    Provision = 0x05,
    NodeAdded = 0x06,
    ConfigureNode = 0x07,
    ConfigureNodeStatus = 0x08,
    SendMessage = 0x09,
    Reset = 0x10,
    Reboot = 0x11,
    NodeReset = 0x12,
    State = 0x13,
    ConfigureElement = 0x14,
    ConfigureElementStatus = 0x15,
    SendRecallMessage = 0x16,
    SendStoreMessage = 0x17,
    SendDeleteMessage = 0x18,
    SendBindMessage = 0x19,
    Event = 0x20,
}

impl Opcode {
    /// Every opcode, in wire-value order
    pub const ALL: [Opcode; 21] = [
        Opcode::Setup,
        Opcode::SetupStatus,
        Opcode::AddKey,
        Opcode::AddKeyStatus,
        Opcode::UnprovisionedBeacon,
        Opcode::Provision,
        Opcode::NodeAdded,
        Opcode::ConfigureNode,
        Opcode::ConfigureNodeStatus,
        Opcode::SendMessage,
        Opcode::Reset,
        Opcode::Reboot,
        Opcode::NodeReset,
        Opcode::State,
        Opcode::ConfigureElement,
        Opcode::ConfigureElementStatus,
        Opcode::SendRecallMessage,
        Opcode::SendStoreMessage,
        Opcode::SendDeleteMessage,
        Opcode::SendBindMessage,
        Opcode::Event,
    ];

    /// Look up an opcode by its wire value
    pub const fn from_byte(byte: u8) -> Option<Self> {
        let opcode = match byte {
            0x00 => Opcode::Setup,
            0x01 => Opcode::SetupStatus,
            0x02 => Opcode::AddKey,
            0x03 => Opcode::AddKeyStatus,
            0x04 => Opcode::UnprovisionedBeacon,
            0x05 => Opcode::Provision,
            0x06 => Opcode::NodeAdded,
            0x07 => Opcode::ConfigureNode,
            0x08 => Opcode::ConfigureNodeStatus,
            0x09 => Opcode::SendMessage,
            0x10 => Opcode::Reset,
            0x11 => Opcode::Reboot,
            0x12 => Opcode::NodeReset,
            0x13 => Opcode::State,
            0x14 => Opcode::ConfigureElement,
            0x15 => Opcode::ConfigureElementStatus,
            0x16 => Opcode::SendRecallMessage,
            0x17 => Opcode::SendStoreMessage,
            0x18 => Opcode::SendDeleteMessage,
            0x19 => Opcode::SendBindMessage,
            0x20 => Opcode::Event,
            _ => return None,
        };
        Some(opcode)
    }

    /// Wire value of this opcode
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Which endpoint carries frames with this opcode
    pub const fn direction(self) -> Direction {
        match self {
            Opcode::SetupStatus
            | Opcode::AddKeyStatus
            | Opcode::UnprovisionedBeacon
            | Opcode::NodeAdded
            | Opcode::ConfigureNodeStatus
            | Opcode::State
            | Opcode::ConfigureElementStatus
            | Opcode::Event => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }

    /// Payload length in bytes (excluding the opcode byte)
    pub const fn payload_len(self) -> usize {
        match self {
            Opcode::Setup
            | Opcode::SetupStatus
            | Opcode::ConfigureNodeStatus
            | Opcode::ConfigureElementStatus
            | Opcode::Reset
            | Opcode::Reboot => 0,
            Opcode::AddKey
            | Opcode::AddKeyStatus
            | Opcode::NodeAdded
            | Opcode::NodeReset
            | Opcode::Event => 2,
            Opcode::State => 3,
            Opcode::ConfigureNode => 4,
            Opcode::SendMessage => 5,
            Opcode::SendRecallMessage
            | Opcode::SendStoreMessage
            | Opcode::SendDeleteMessage
            | Opcode::SendBindMessage => 6,
            Opcode::ConfigureElement => 8,
            Opcode::UnprovisionedBeacon | Opcode::Provision => 16,
        }
    }

    /// Total frame length including the opcode byte
    pub const fn frame_len(self) -> usize {
        1 + self.payload_len()
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_byte(byte).ok_or(byte)
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode.as_byte()
    }
}

/// Length of the longest frame in the table (Provision / UnprovisionedBeacon)
pub const MAX_FRAME_LEN: usize = max_frame_len();

const fn max_frame_len() -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < Opcode::ALL.len() {
        let len = Opcode::ALL[i].frame_len();
        if len > max {
            max = len;
        }
        i += 1;
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_from_byte_matches_discriminant() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_byte(opcode.as_byte()), Some(opcode));
        }
    }

    #[test]
    fn test_wire_values_are_unique() {
        let values: HashSet<u8> = Opcode::ALL.iter().map(|op| op.as_byte()).collect();
        assert_eq!(values.len(), Opcode::ALL.len());
    }

    #[test]
    fn test_unassigned_bytes_are_unknown() {
        for byte in [0x0A, 0x0F, 0x1A, 0x1F, 0x21, 0x7F, 0xFF] {
            assert_eq!(Opcode::from_byte(byte), None);
            assert_eq!(Opcode::try_from(byte), Err(byte));
        }
    }

    #[test]
    fn test_frame_lengths() {
        assert_eq!(Opcode::Setup.frame_len(), 1);
        assert_eq!(Opcode::AddKey.frame_len(), 3);
        assert_eq!(Opcode::Provision.frame_len(), 17);
        assert_eq!(Opcode::SendMessage.frame_len(), 6);
        assert_eq!(Opcode::ConfigureElement.frame_len(), 9);
        assert_eq!(Opcode::State.frame_len(), 4);
        assert_eq!(MAX_FRAME_LEN, 17);
    }

    #[test]
    fn test_directions() {
        assert_eq!(Opcode::Setup.direction(), Direction::Outbound);
        assert_eq!(Opcode::SetupStatus.direction(), Direction::Inbound);
        assert_eq!(Opcode::NodeReset.direction(), Direction::Outbound);
        assert_eq!(Opcode::ConfigureElementStatus.direction(), Direction::Inbound);
        assert_eq!(Opcode::Event.direction(), Direction::Inbound);
    }
}
