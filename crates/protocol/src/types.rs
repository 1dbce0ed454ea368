//! Field types carried in mesh controller frames
//!
//! All multi-byte integers travel little-endian. The newtypes exist so a
//! node address can never be passed where an app key index is expected.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a decimal or `0x`-prefixed hex integer no larger than `max`
fn parse_int(field: &'static str, text: &str, max: u32) -> Result<u32> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };

    match parsed {
        Ok(value) if value <= max => Ok(value),
        Ok(value) => Err(ProtocolError::InvalidField {
            field,
            message: format!("{} is out of range (max {:#x})", value, max),
        }),
        Err(e) => Err(ProtocolError::InvalidField {
            field,
            message: format!("'{}': {}", text, e),
        }),
    }
}

macro_rules! wire_u16 {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u16);

        impl $name {
            /// Little-endian wire bytes
            pub const fn to_le_bytes(self) -> [u8; 2] {
                self.0.to_le_bytes()
            }

            /// Build from little-endian wire bytes
            pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
                Self(u16::from_le_bytes(bytes))
            }
        }

        impl From<u16> for $name {
            fn from(value: u16) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> u16 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#06x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self> {
                parse_int($field, s, u16::MAX as u32).map(|v| Self(v as u16))
            }
        }
    };
}

wire_u16!(
    /// Unicast, group or element address inside the mesh network
    Address,
    "address"
);

wire_u16!(
    /// Application key slot on the controller
    AppKeyIndex,
    "app key index"
);

wire_u16!(
    /// Stored scene identifier
    SceneNumber,
    "scene number"
);

/// Opaque application state byte (e.g. on/off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateValue(pub u8);

impl From<u8> for StateValue {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl FromStr for StateValue {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        parse_int("state", s, u8::MAX as u32).map(|v| Self(v as u8))
    }
}

/// Device UUID advertised by an unprovisioned node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceUuid(pub [u8; 16]);

impl DeviceUuid {
    /// Width of the UUID on the wire
    pub const LEN: usize = 16;

    /// Raw UUID bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for DeviceUuid {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Accepts 32 hex digits, optionally in the dashed 8-4-4-4-12 form
impl FromStr for DeviceUuid {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.trim().chars().filter(|c| *c != '-').collect();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&digits, &mut bytes).map_err(|e| ProtocolError::InvalidField {
            field: "device uuid",
            message: format!("'{}': {}", s, e),
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for DeviceUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
