//! Device session lifecycle
//!
//! A session is one enumerated device: its resolved path and name, the
//! transport that talks to it, and the bulk endpoint pair discovered after
//! opening. States go `Closed -> Opened -> Closed`; dropping a session closes
//! it.

use crate::error::{DriverError, Result};
use crate::transport::{DeviceLocation, Direction, TransferKind, Transport};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Transfer timeout used unless the session is given another one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opened,
}

/// Resolved bulk endpoint pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub bulk_in: u8,
    pub bulk_out: u8,
}

pub struct DeviceSession<T: Transport> {
    location: DeviceLocation,
    state: SessionState,
    endpoints: Option<Endpoints>,
    timeout: Duration,
    transport: T,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(location: DeviceLocation, transport: T) -> Self {
        Self {
            location,
            state: SessionState::Closed,
            endpoints: None,
            timeout: DEFAULT_TIMEOUT,
            transport,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &str {
        &self.location.path
    }

    pub fn identifier(&self) -> &str {
        &self.location.identifier
    }

    pub fn location(&self) -> &DeviceLocation {
        &self.location
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Opened
    }

    /// Bulk endpoints, once discovered
    pub fn endpoints(&self) -> Option<Endpoints> {
        self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Acquire exclusive access to the device
    ///
    /// A no-op when already open. On failure the session stays closed and the
    /// transport has released anything it acquired.
    pub fn open(&mut self) -> Result<()> {
        if self.location.path.is_empty() {
            return Err(DriverError::PathUnset);
        }
        if self.state == SessionState::Opened {
            return Ok(());
        }

        self.transport.open().inspect_err(|e| {
            warn!("Failed to open {}: {}", self.location, e);
        })?;
        self.state = SessionState::Opened;
        info!("Opened {}", self.location);
        Ok(())
    }

    /// Find the first bulk IN and first bulk OUT endpoint
    ///
    /// May be called again; the previous pair is replaced only on success.
    pub fn discover_endpoints(&mut self) -> Result<Endpoints> {
        if self.state != SessionState::Opened {
            return Err(DriverError::NotOpen);
        }

        let bulk = self
            .transport
            .endpoints()?
            .into_iter()
            .filter(|ep| ep.transfer == TransferKind::Bulk)
            .collect::<Vec<_>>();

        let bulk_in = bulk.iter().find(|ep| ep.direction() == Direction::In);
        let bulk_out = bulk.iter().find(|ep| ep.direction() == Direction::Out);

        let endpoints = match (bulk_in, bulk_out) {
            (Some(bulk_in), Some(bulk_out)) => Endpoints {
                bulk_in: bulk_in.address,
                bulk_out: bulk_out.address,
            },
            (None, _) => {
                return Err(DriverError::EndpointDiscovery(format!(
                    "{} has no bulk IN endpoint",
                    self.location
                )));
            }
            (_, None) => {
                return Err(DriverError::EndpointDiscovery(format!(
                    "{} has no bulk OUT endpoint",
                    self.location
                )));
            }
        };

        debug!(
            "{}: bulk IN {:#04x}, bulk OUT {:#04x}",
            self.location, endpoints.bulk_in, endpoints.bulk_out
        );
        self.endpoints = Some(endpoints);
        Ok(endpoints)
    }

    fn ready(&self) -> Result<Endpoints> {
        if self.state != SessionState::Opened {
            return Err(DriverError::NotOpen);
        }
        self.endpoints.ok_or(DriverError::EndpointsUnresolved)
    }

    /// Write a command to the bulk OUT endpoint
    pub fn send(&mut self, command: &[u8]) -> Result<()> {
        let endpoints = self.ready()?;
        let written = self
            .transport
            .write(endpoints.bulk_out, command, self.timeout)?;
        if written < command.len() {
            return Err(DriverError::ShortWrite {
                expected: command.len(),
                actual: written,
            });
        }
        Ok(())
    }

    /// Read exactly `expected_len` bytes from the bulk IN endpoint
    ///
    /// Reads until the buffer is full; an empty read or a timeout ends the
    /// transfer early and yields `ShortRead`.
    pub fn receive(&mut self, expected_len: usize) -> Result<Vec<u8>> {
        let endpoints = self.ready()?;
        let mut buf = vec![0u8; expected_len];
        let mut filled = 0;

        while filled < expected_len {
            match self
                .transport
                .read(endpoints.bulk_in, &mut buf[filled..], self.timeout)
            {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(DriverError::Timeout) => {
                    debug!(
                        "{}: read timed out after {}/{} bytes",
                        self.location, filled, expected_len
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if filled < expected_len {
            return Err(DriverError::ShortRead {
                expected: expected_len,
                actual: filled,
            });
        }
        Ok(buf)
    }

    /// Send `command` then read an `expected_len`-byte reply
    pub fn transact(&mut self, command: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        self.send(command)?;
        self.receive(expected_len)
    }

    /// Release the device; a no-op when already closed
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport.close();
        self.state = SessionState::Closed;
        self.endpoints = None;
        debug!("Closed {}", self.location);
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> std::fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("location", &self.location)
            .field("state", &self.state)
            .field("endpoints", &self.endpoints)
            .field("transport", &self.transport.describe())
            .finish()
    }
}
