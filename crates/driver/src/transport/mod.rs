//! Transports and host subsystems
//!
//! A [`Transport`] moves bytes to and from one device; a [`HostSubsystem`]
//! finds devices and builds transports for them. The session layer only sees
//! these two traits, so USB, serial and mock devices are interchangeable.

pub mod serial;
pub mod usb;

pub use serial::{DataBits, Parity, SerialHost, SerialSettings, SerialTransport, StopBits};
pub use usb::{UsbHost, UsbTransport};

use crate::error::Result;
use common::DeviceFilter;
use std::fmt;
use std::time::Duration;

/// Endpoint transfer type, as reported by the endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// One endpoint of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointInfo {
    pub address: u8,
    pub transfer: TransferKind,
    pub max_packet_size: u16,
}

impl EndpointInfo {
    pub fn bulk(address: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            transfer: TransferKind::Bulk,
            max_packet_size,
        }
    }

    /// Direction from bit 7 of the address
    pub fn direction(&self) -> Direction {
        if self.address & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// Where an enumerated device lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLocation {
    /// Platform path used to open the device
    pub path: String,
    /// Human-readable name (serial number when available)
    pub identifier: String,
}

impl DeviceLocation {
    pub fn new(path: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for DeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path == self.identifier {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{} ({})", self.identifier, self.path)
        }
    }
}

/// Byte transport to a single device
///
/// Implementations own their OS handles exclusively. `open` must release
/// everything it acquired when it fails, and `close` must be safe to call on a
/// closed transport.
pub trait Transport: Send {
    /// Short description for log messages
    fn describe(&self) -> String;

    /// Acquire the OS handles needed for transfers
    fn open(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Every endpoint the device reports
    fn endpoints(&mut self) -> Result<Vec<EndpointInfo>>;

    /// Write `data` to `endpoint`, returning the number of bytes accepted
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Read up to `buf.len()` bytes from `endpoint`
    fn read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release all handles
    fn close(&mut self);
}

/// Source of devices for the registry
pub trait HostSubsystem {
    /// Device as reported by the subsystem before a session exists
    type Device;
    type Transport: Transport;

    /// Every present device matching `filter`
    fn devices(&mut self, filter: &DeviceFilter) -> Result<Vec<Self::Device>>;

    /// Resolve the platform path and identifier of `device`
    fn resolve(&mut self, device: &Self::Device) -> Result<DeviceLocation>;

    /// Build an unopened transport for `device`
    fn transport(&mut self, device: Self::Device) -> Self::Transport;
}
