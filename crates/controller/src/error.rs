//! Controller error types

use common::TransportError;
use protocol::ProtocolError;
use thiserror::Error;

/// Failure while acquiring the dongle; one variant per setup stage
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Failed to initialise USB context: {0}")]
    Context(#[source] rusb::Error),

    #[error("Device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Failed to open device {vendor_id:04x}:{product_id:04x}: {source}")]
    Open {
        vendor_id: u16,
        product_id: u16,
        #[source]
        source: rusb::Error,
    },

    #[error("Failed to enable kernel driver auto-detach: {0}")]
    AutoDetach(#[source] rusb::Error),

    #[error("Failed to select configuration {configuration}: {source}")]
    Configuration {
        configuration: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Failed to claim interface {interface}: {source}")]
    ClaimInterface {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Failed to select alternate setting {alt_setting} on interface {interface}: {source}")]
    AlternateSetting {
        interface: u8,
        alt_setting: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("Endpoint {address:#04x} not found on interface {interface}")]
    EndpointNotFound { interface: u8, address: u8 },

    #[error("Endpoint max packet size {size} is smaller than the largest frame ({required} bytes)")]
    PacketTooSmall { size: usize, required: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),

    /// Every attempt allowed by the retry policy failed
    #[error("Write failed after {attempts} attempt(s): {source}")]
    WriteFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Session-ending transport fault seen by the dispatcher
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Dispatcher is already running")]
    AlreadyListening,

    #[error("Failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Dispatcher thread panicked")]
    DispatcherPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
