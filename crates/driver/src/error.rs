//! Driver error types
//!
//! Every failure of enumeration, session lifecycle or transfer is reported as a
//! [`DriverError`]; nothing in the driver panics on a device fault.

use protocol::ProtocolError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Device vanished or never existed
    #[error("Device not found")]
    DeviceNotFound,

    #[error("Permission denied opening device")]
    PermissionDenied,

    /// Interface or port already claimed by another process
    #[error("Device is busy")]
    DeviceBusy,

    #[error("Device path is not set")]
    PathUnset,

    /// The host could not resolve a platform path for an enumerated device
    #[error("Could not resolve device path: {0}")]
    PathUnresolved(String),

    #[error("Session is not open")]
    NotOpen,

    #[error("Bulk endpoints have not been discovered")]
    EndpointsUnresolved,

    #[error("Endpoint discovery failed: {0}")]
    EndpointDiscovery(String),

    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Transfer timed out")]
    Timeout,

    /// Configuration descriptor, interface claim or port settings failed
    #[error("Configuration failed: {0}")]
    Configuration(String),

    #[error("USB error: {0}")]
    Usb(rusb::Error),

    #[error("Serial port error: {0}")]
    Serial(serialport::Error),

    #[error("IO error: {0}")]
    Io(io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl From<rusb::Error> for DriverError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::NotFound | rusb::Error::NoDevice => DriverError::DeviceNotFound,
            rusb::Error::Access => DriverError::PermissionDenied,
            rusb::Error::Busy => DriverError::DeviceBusy,
            rusb::Error::Timeout => DriverError::Timeout,
            other => DriverError::Usb(other),
        }
    }
}

impl From<serialport::Error> for DriverError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => DriverError::DeviceNotFound,
            serialport::ErrorKind::InvalidInput => DriverError::Configuration(e.to_string()),
            serialport::ErrorKind::Io(kind) => DriverError::from(io::Error::new(kind, e)),
            _ => DriverError::Serial(e),
        }
    }
}

impl From<io::Error> for DriverError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DriverError::Timeout,
            io::ErrorKind::NotFound => DriverError::DeviceNotFound,
            io::ErrorKind::PermissionDenied => DriverError::PermissionDenied,
            _ => DriverError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusb_error_mapping() {
        assert!(matches!(
            DriverError::from(rusb::Error::NoDevice),
            DriverError::DeviceNotFound
        ));
        assert!(matches!(
            DriverError::from(rusb::Error::Access),
            DriverError::PermissionDenied
        ));
        assert!(matches!(
            DriverError::from(rusb::Error::Timeout),
            DriverError::Timeout
        ));
        assert!(matches!(
            DriverError::from(rusb::Error::Pipe),
            DriverError::Usb(rusb::Error::Pipe)
        ));
    }

    #[test]
    fn test_io_error_mapping() {
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "no data");
        assert!(matches!(DriverError::from(timeout), DriverError::Timeout));

        let other = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(DriverError::from(other), DriverError::Io(_)));
    }

    #[test]
    fn test_serial_error_mapping() {
        let missing = serialport::Error::new(serialport::ErrorKind::NoDevice, "COM9");
        assert!(matches!(
            DriverError::from(missing),
            DriverError::DeviceNotFound
        ));

        let denied = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "/dev/ttyACM0",
        );
        assert!(matches!(
            DriverError::from(denied),
            DriverError::PermissionDenied
        ));
    }

    #[test]
    fn test_short_read_display() {
        let err = DriverError::ShortRead {
            expected: 2048,
            actual: 480,
        };
        assert_eq!(err.to_string(), "Short read: expected 2048 bytes, got 480");
    }
}
