//! Mesh controller dongle over rusb
//!
//! Opening the dongle acquires, in order: the libusb context, the device
//! handle, the configuration, and the claimed interface. All of them live
//! inside one `UsbTransport`, and dropping it (or failing half-way through
//! `open`) releases whatever was acquired.

use crate::config::DeviceSettings;
use crate::error::OpenError;
use crate::usb::transfers::{read_packet, write_frame};
use common::{Transport, TransportError};
use protocol::MAX_FRAME_LEN;
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Direction bit of an endpoint address
const ENDPOINT_IN: u8 = 0x80;

/// Interface claimed on an open handle; released on drop
struct ClaimedInterface {
    handle: DeviceHandle<Context>,
    interface: u8,
}

impl Drop for ClaimedInterface {
    fn drop(&mut self) {
        match self.handle.release_interface(self.interface) {
            Ok(()) => debug!("Released interface {}", self.interface),
            Err(rusb::Error::NoDevice) => {
                debug!(
                    "Interface {} not released: device already gone",
                    self.interface
                )
            }
            Err(e) => warn!("Failed to release interface {}: {}", self.interface, e),
        }
    }
}

/// Transport backed by the dongle's two bulk endpoints
pub struct UsbTransport {
    claim: ClaimedInterface,
    endpoint_in: u8,
    endpoint_out: u8,
    max_packet_size: usize,
    write_timeout: Duration,
}

impl UsbTransport {
    /// Find, open and claim the dongle described by `settings`
    pub fn open(settings: &DeviceSettings) -> Result<Self, OpenError> {
        let context = Context::new().map_err(OpenError::Context)?;
        let mut handle = open_device(&context, settings.vendor_id, settings.product_id)?;

        if settings.auto_detach {
            match handle.set_auto_detach_kernel_driver(true) {
                Ok(()) => debug!("Kernel driver auto-detach enabled"),
                Err(rusb::Error::NotSupported) => {
                    debug!("Kernel driver auto-detach not supported on this platform")
                }
                Err(e) => return Err(OpenError::AutoDetach(e)),
            }
        }

        match handle.active_configuration() {
            Ok(active) if active == settings.configuration => {
                debug!("Configuration {} already active", active);
            }
            _ => handle
                .set_active_configuration(settings.configuration)
                .map_err(|source| OpenError::Configuration {
                    configuration: settings.configuration,
                    source,
                })?,
        }

        handle
            .claim_interface(settings.interface)
            .map_err(|source| OpenError::ClaimInterface {
                interface: settings.interface,
                source,
            })?;
        let mut claim = ClaimedInterface {
            handle,
            interface: settings.interface,
        };
        debug!("Claimed interface {}", settings.interface);

        // From here on, returning early drops `claim` and releases the interface
        claim
            .handle
            .set_alternate_setting(settings.interface, settings.alt_setting)
            .map_err(|source| OpenError::AlternateSetting {
                interface: settings.interface,
                alt_setting: settings.alt_setting,
                source,
            })?;

        let endpoint_in = ENDPOINT_IN | (settings.endpoint_in & 0x0F);
        let endpoint_out = settings.endpoint_out & 0x0F;
        let endpoints = find_bulk_endpoints(&claim.handle, settings)?;

        let in_size = endpoints
            .iter()
            .find(|(address, _)| *address == endpoint_in)
            .map(|(_, size)| *size)
            .ok_or(OpenError::EndpointNotFound {
                interface: settings.interface,
                address: endpoint_in,
            })?;
        if !endpoints.iter().any(|(address, _)| *address == endpoint_out) {
            return Err(OpenError::EndpointNotFound {
                interface: settings.interface,
                address: endpoint_out,
            });
        }

        if in_size < MAX_FRAME_LEN {
            return Err(OpenError::PacketTooSmall {
                size: in_size,
                required: MAX_FRAME_LEN,
            });
        }

        info!(
            "Opened mesh controller {:04x}:{:04x} (interface {}, IN {:#04x}, OUT {:#04x}, max packet {} bytes)",
            settings.vendor_id,
            settings.product_id,
            settings.interface,
            endpoint_in,
            endpoint_out,
            in_size
        );

        Ok(Self {
            claim,
            endpoint_in,
            endpoint_out,
            max_packet_size: in_size,
            write_timeout: settings.write_timeout(),
        })
    }
}

impl Transport for UsbTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        write_frame(
            &self.claim.handle,
            self.endpoint_out,
            frame,
            self.write_timeout,
        )
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        read_packet(
            &self.claim.handle,
            self.endpoint_in,
            self.max_packet_size,
            timeout,
        )
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

/// Locate the device by VID:PID and open it
///
/// Kept separate from lookup so "not plugged in" and "no permission" surface
/// as different errors.
fn open_device(
    context: &Context,
    vendor_id: u16,
    product_id: u16,
) -> Result<DeviceHandle<Context>, OpenError> {
    let devices = context.devices().map_err(OpenError::Context)?;

    let device = devices
        .iter()
        .find(|device| {
            device
                .device_descriptor()
                .map(|desc| desc.vendor_id() == vendor_id && desc.product_id() == product_id)
                .unwrap_or(false)
        })
        .ok_or(OpenError::DeviceNotFound {
            vendor_id,
            product_id,
        })?;

    debug!(
        "Found {:04x}:{:04x} on bus {:03} address {:03}",
        vendor_id,
        product_id,
        device.bus_number(),
        device.address()
    );

    device.open().map_err(|source| OpenError::Open {
        vendor_id,
        product_id,
        source,
    })
}

/// Bulk endpoints (address, max packet size) of the configured interface setting
fn find_bulk_endpoints(
    handle: &DeviceHandle<Context>,
    settings: &DeviceSettings,
) -> Result<Vec<(u8, usize)>, OpenError> {
    let config = handle
        .device()
        .active_config_descriptor()
        .map_err(|source| OpenError::Configuration {
            configuration: settings.configuration,
            source,
        })?;

    let endpoints = config
        .interfaces()
        .filter(|interface| interface.number() == settings.interface)
        .flat_map(|interface| interface.descriptors())
        .filter(|desc| desc.setting_number() == settings.alt_setting)
        .flat_map(|desc| {
            desc.endpoint_descriptors()
                .filter(|ep| ep.transfer_type() == rusb::TransferType::Bulk)
                .map(|ep| (ep.address(), ep.max_packet_size() as usize))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(endpoints)
}
