//! Protocol error types

use crate::Opcode;
use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A frame must carry at least its opcode byte
    #[error("Empty frame")]
    EmptyFrame,

    /// Known opcode, but the packet ends before the payload does
    #[error("Truncated {opcode:?} frame: expected {expected} bytes, got {actual}")]
    Truncated {
        opcode: Opcode,
        expected: usize,
        actual: usize,
    },

    /// Opcode byte that is not valid in the position it was found
    #[error("Unexpected opcode {opcode:#04x}: not a known {expected} opcode")]
    UnexpectedOpcode { opcode: u8, expected: &'static str },

    /// Textual field value that could not be parsed
    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display() {
        let err = ProtocolError::Truncated {
            opcode: Opcode::UnprovisionedBeacon,
            expected: 17,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("UnprovisionedBeacon"));
        assert!(msg.contains("17"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn test_unexpected_opcode_display() {
        let err = ProtocolError::UnexpectedOpcode {
            opcode: 0x42,
            expected: "command",
        };
        assert_eq!(
            err.to_string(),
            "Unexpected opcode 0x42: not a known command opcode"
        );
    }
}
