//! Test utilities for the driver
//!
//! [`MockTransport`] emulates an MCA on the far side of a bulk pipe: it
//! answers query and zero commands the way the firmware does, and can be told
//! to misbehave. [`MockHost`] hands out mock transports for a fixed list of
//! devices.
//!
//! # Example
//!
//! ```
//! use driver::test_utils::MockHost;
//! use driver::DeviceRegistry;
//! use common::DeviceFilter;
//!
//! let mut host = MockHost::new()
//!     .with_device("1-2", "MCA0001")
//!     .with_unresolvable_device();
//! let mut registry = DeviceRegistry::new();
//! let added = registry.enumerate(&mut host, &DeviceFilter::default()).unwrap();
//! assert_eq!(added, 1);
//! ```

use crate::error::{DriverError, Result};
use crate::transport::{DeviceLocation, EndpointInfo, HostSubsystem, Transport};
use common::{CAPEMCA_PRODUCT_ID, CAPEMCA_VENDOR_ID, DeviceFilter};
use protocol::{Command, Opcode, PacketZero, RequestType, Spectrum};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Default bulk pair of the MCA firmware
pub const MOCK_BULK_OUT: u8 = 0x01;
pub const MOCK_BULK_IN: u8 = 0x81;

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    open_calls: usize,
    close_calls: usize,
    writes: Vec<Vec<u8>>,
}

/// Shared view of what a [`MockTransport`] has been asked to do
///
/// Stays readable after the transport has moved into a session or registry.
#[derive(Debug, Clone, Default)]
pub struct MockLog(Arc<Mutex<MockState>>);

impl MockLog {
    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn open_calls(&self) -> usize {
        self.state().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    /// Every accepted write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }
}

/// Emulated MCA behind a bulk pipe
pub struct MockTransport {
    name: String,
    log: MockLog,
    endpoints: Vec<EndpointInfo>,
    counts: Vec<u32>,
    packet_zero: PacketZero,
    zero_echo: [u8; 2],
    pending: VecDeque<u8>,
    open_error: Option<fn() -> DriverError>,
    write_limit: Option<usize>,
    reply_limit: Option<usize>,
    read_chunk: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            log: MockLog::default(),
            endpoints: vec![
                EndpointInfo::bulk(MOCK_BULK_OUT, 64),
                EndpointInfo::bulk(MOCK_BULK_IN, 64),
            ],
            counts: Vec::new(),
            packet_zero: PacketZero::default(),
            zero_echo: Command::zero().encode(),
            pending: VecDeque::new(),
            open_error: None,
            write_limit: None,
            reply_limit: None,
            read_chunk: 64,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Spectrum counts; padded with zeros or cut to the requested size
    pub fn with_counts(mut self, counts: Vec<u32>) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_packet_zero(mut self, packet_zero: PacketZero) -> Self {
        self.packet_zero = packet_zero;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<EndpointInfo>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Reply to the zero command with `echo` instead of the command itself
    pub fn with_zero_echo(mut self, echo: [u8; 2]) -> Self {
        self.zero_echo = echo;
        self
    }

    /// Make `open` fail with the error built by `error`
    pub fn failing_open(mut self, error: fn() -> DriverError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Accept at most `limit` bytes per write
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Send at most `limit` bytes of every reply
    pub fn with_reply_limit(mut self, limit: usize) -> Self {
        self.reply_limit = Some(limit);
        self
    }

    /// Return at most `chunk` bytes per read
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = chunk.max(1);
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn reply_to(&mut self, command: &[u8]) -> Vec<u8> {
        match command {
            [op, parameter] if *op == Opcode::Query as u8 => {
                let Ok(request) = RequestType::new(u32::from(*parameter)) else {
                    return Vec::new();
                };
                let mut counts = self.counts.clone();
                counts.resize(request.spectrum_channels(), 0);
                let mut reply = Spectrum::from_counts(counts).encode();
                if request.includes_packet_zero() {
                    reply.extend_from_slice(&self.packet_zero.encode());
                }
                reply
            }
            [op, 1] if *op == Opcode::Zero as u8 => {
                self.counts.iter_mut().for_each(|count| *count = 0);
                self.zero_echo.to_vec()
            }
            _ => Vec::new(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.log.state();
        state.open_calls += 1;
        if let Some(error) = self.open_error {
            return Err(error());
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.log.is_open()
    }

    fn endpoints(&mut self) -> Result<Vec<EndpointInfo>> {
        Ok(self.endpoints.clone())
    }

    fn write(&mut self, _endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize> {
        if !self.log.is_open() {
            return Err(DriverError::NotOpen);
        }

        let accepted = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.log.state().writes.push(data[..accepted].to_vec());
        if accepted < data.len() {
            return Ok(accepted);
        }

        let mut reply = self.reply_to(data);
        if let Some(limit) = self.reply_limit {
            reply.truncate(limit);
        }
        self.pending.extend(reply);
        Ok(accepted)
    }

    fn read(&mut self, _endpoint: u8, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.log.is_open() {
            return Err(DriverError::NotOpen);
        }
        if self.pending.is_empty() {
            return Err(DriverError::Timeout);
        }

        let n = buf.len().min(self.read_chunk).min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) {
        let mut state = self.log.state();
        state.close_calls += 1;
        state.open = false;
        self.pending.clear();
    }
}

/// Device offered by a [`MockHost`]
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    /// `None` when the host cannot resolve the device's path
    pub location: Option<DeviceLocation>,
    pub counts: Vec<u32>,
    pub packet_zero: PacketZero,
}

/// Host subsystem with a fixed device list
#[derive(Debug, Default)]
pub struct MockHost {
    devices: Vec<MockDevice>,
    logs: Vec<MockLog>,
    unavailable: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// CapeMCA device at `path`
    pub fn with_device(self, path: &str, identifier: &str) -> Self {
        self.with_spectrum_device(path, identifier, Vec::new())
    }

    /// CapeMCA device at `path` that has accumulated `counts`
    pub fn with_spectrum_device(self, path: &str, identifier: &str, counts: Vec<u32>) -> Self {
        self.with(MockDevice {
            vendor_id: CAPEMCA_VENDOR_ID,
            product_id: CAPEMCA_PRODUCT_ID,
            location: Some(DeviceLocation::new(path, identifier)),
            counts,
            packet_zero: PacketZero::default(),
        })
    }

    /// CapeMCA device whose path cannot be resolved
    pub fn with_unresolvable_device(self) -> Self {
        self.with(MockDevice {
            vendor_id: CAPEMCA_VENDOR_ID,
            product_id: CAPEMCA_PRODUCT_ID,
            location: None,
            counts: Vec::new(),
            packet_zero: PacketZero::default(),
        })
    }

    /// Device listing fails as if the subsystem were missing
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Logs of every transport built so far, in build order
    pub fn logs(&self) -> &[MockLog] {
        &self.logs
    }
}

impl HostSubsystem for MockHost {
    type Device = MockDevice;
    type Transport = MockTransport;

    fn devices(&mut self, filter: &DeviceFilter) -> Result<Vec<MockDevice>> {
        if self.unavailable {
            return Err(DriverError::Io(io::Error::other(
                "host subsystem unavailable",
            )));
        }
        Ok(self
            .devices
            .iter()
            .filter(|device| filter.matches(device.vendor_id, device.product_id))
            .cloned()
            .collect())
    }

    fn resolve(&mut self, device: &MockDevice) -> Result<DeviceLocation> {
        device
            .location
            .clone()
            .ok_or_else(|| DriverError::PathUnresolved("no device interface path".to_string()))
    }

    fn transport(&mut self, device: MockDevice) -> MockTransport {
        let name = device
            .location
            .map_or_else(|| "mock".to_string(), |location| location.path);
        let transport = MockTransport::new()
            .named(name)
            .with_counts(device.counts)
            .with_packet_zero(device.packet_zero);
        self.logs.push(transport.log());
        transport
    }
}
