//! Bulk transfer execution
//!
//! Thin wrappers around rusb's synchronous bulk calls that map rusb errors
//! to transport errors and trace the bytes moved.

use common::TransportError;
use rusb::{Context, DeviceHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Write a whole frame to a bulk OUT endpoint
///
/// A transfer that completes with fewer bytes than the frame is reported as
/// `ShortWrite`: the dongle only accepts complete frames.
pub fn write_frame(
    handle: &DeviceHandle<Context>,
    endpoint: u8,
    frame: &[u8],
    timeout: Duration,
) -> Result<(), TransportError> {
    trace!("Bulk OUT {:#04x}: {:02x?}", endpoint, frame);

    let written = handle
        .write_bulk(endpoint, frame, timeout)
        .map_err(map_rusb_error)?;

    if written != frame.len() {
        debug!(
            "Short bulk write on {:#04x}: {} of {} bytes",
            endpoint,
            written,
            frame.len()
        );
        return Err(TransportError::ShortWrite {
            written,
            expected: frame.len(),
        });
    }

    Ok(())
}

/// Read one packet from a bulk IN endpoint into a `max_packet_size` buffer
pub fn read_packet(
    handle: &DeviceHandle<Context>,
    endpoint: u8,
    max_packet_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    let mut buffer = vec![0u8; max_packet_size];
    let len = handle
        .read_bulk(endpoint, &mut buffer, timeout)
        .map_err(map_rusb_error)?;
    buffer.truncate(len);

    trace!("Bulk IN {:#04x}: {:02x?}", endpoint, buffer);
    Ok(buffer)
}

/// Map rusb::Error to TransportError
///
/// `NoDevice` becomes `Disconnected`, the only error that ends a session.
pub fn map_rusb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::Timeout => TransportError::Timeout,
        rusb::Error::NoDevice => TransportError::Disconnected,
        rusb::Error::Overflow => TransportError::Overflow,
        rusb::Error::Io => TransportError::Io,
        rusb::Error::Pipe => TransportError::Pipe,
        rusb::Error::Interrupted => TransportError::Interrupted,
        _ => TransportError::Other(err.to_string()),
    }
}
