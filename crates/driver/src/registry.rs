//! Device session registry
//!
//! Owns one [`DeviceSession`] per enumerated device, kept in enumeration order
//! in a [`List`]. Sessions are addressed by the list's [`NodeId`] handles.

use crate::error::Result;
use crate::session::{DEFAULT_TIMEOUT, DeviceSession};
use crate::transport::{HostSubsystem, Transport};
use common::{DeviceFilter, List, NodeId};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct DeviceRegistry<T: Transport> {
    sessions: List<DeviceSession<T>>,
    /// Timeout given to sessions created by `enumerate`
    timeout: Duration,
}

impl<T: Transport> DeviceRegistry<T> {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: List::new(),
            timeout,
        }
    }

    /// Add a session for every present device matching `filter`
    ///
    /// Devices whose path the host cannot resolve are skipped. Returns the
    /// number of sessions added; fails only when the host subsystem itself
    /// cannot be queried.
    pub fn enumerate<H>(&mut self, host: &mut H, filter: &DeviceFilter) -> Result<usize>
    where
        H: HostSubsystem<Transport = T>,
    {
        let devices = host.devices(filter)?;
        let found = devices.len();
        let mut added = 0;

        for device in devices {
            let location = match host.resolve(&device) {
                Ok(location) => location,
                Err(e) => {
                    warn!("Skipping device matching {}: {}", filter, e);
                    continue;
                }
            };

            debug!("Enumerated {}", location);
            let transport = host.transport(device);
            self.sessions
                .add(DeviceSession::new(location, transport).with_timeout(self.timeout));
            added += 1;
        }

        info!(
            "Enumeration found {} devices, {} sessions added",
            found, added
        );
        Ok(added)
    }

    /// Close and drop every session
    pub fn unenumerate(&mut self) {
        while !self.sessions.is_empty() {
            self.sessions.delete_first();
        }
    }

    /// First session whose path or identifier equals `identifier`
    pub fn find(&self, identifier: &str) -> Option<NodeId> {
        self.sessions
            .position(|session| session.path() == identifier || session.identifier() == identifier)
    }

    pub fn add(&mut self, session: DeviceSession<T>) -> NodeId {
        self.sessions.add(session)
    }

    /// Remove a session, handing ownership to the caller
    pub fn extract(&mut self, id: NodeId) -> Option<DeviceSession<T>> {
        self.sessions.extract(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&DeviceSession<T>> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut DeviceSession<T>> {
        self.sessions.get_mut(id)
    }

    /// Session handles in enumeration order
    pub fn ids(&self) -> Vec<NodeId> {
        self.sessions.ids()
    }

    pub fn iter(&self) -> common::Iter<'_, DeviceSession<T>> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<T: Transport> Default for DeviceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
