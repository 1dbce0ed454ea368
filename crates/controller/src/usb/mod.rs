//! USB transport for the mesh controller dongle
//!
//! The dongle is driven with synchronous rusb bulk transfers. Writes and
//! reads use separate endpoints, so the dispatcher can block in a read while
//! commands go out from other threads.

pub mod device;
pub mod transfers;

pub use device::UsbTransport;
