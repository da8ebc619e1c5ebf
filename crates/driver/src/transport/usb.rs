//! libusb transport
//!
//! Wraps a `rusb` device: claims interface 0 (detaching any kernel driver
//! first), walks the configuration descriptors for endpoints and performs
//! bulk transfers.

use super::{DeviceLocation, EndpointInfo, HostSubsystem, TransferKind, Transport};
use crate::error::{DriverError, Result};
use common::DeviceFilter;
use rusb::{ConfigDescriptor, Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Interface carrying the bulk endpoints on the MCA firmware
const INTERFACE: u8 = 0;

/// USB device wrapper
pub struct UsbTransport {
    device: Device<Context>,
    /// Device handle (if opened)
    handle: Option<DeviceHandle<Context>>,
    /// Whether we detached a kernel driver that must be reattached on close
    kernel_driver_detached: bool,
    retry_config_descriptor: bool,
}

impl UsbTransport {
    pub fn new(device: Device<Context>) -> Self {
        Self {
            device,
            handle: None,
            kernel_driver_detached: false,
            retry_config_descriptor: true,
        }
    }

    /// Re-read a configuration descriptor once when the first read fails
    ///
    /// Some hosts return an error on the first descriptor request after the
    /// device has just enumerated.
    pub fn with_config_retry(mut self, retry: bool) -> Self {
        self.retry_config_descriptor = retry;
        self
    }

    fn config_descriptor(&self, index: u8) -> Result<ConfigDescriptor> {
        match self.device.config_descriptor(index) {
            Ok(config) => Ok(config),
            Err(e) if self.retry_config_descriptor => {
                debug!(
                    "Config descriptor {} read failed ({}), retrying once",
                    index, e
                );
                self.device.config_descriptor(index).map_err(|e| {
                    DriverError::Configuration(format!(
                        "Failed to get config descriptor {}: {}",
                        index, e
                    ))
                })
            }
            Err(e) => Err(DriverError::Configuration(format!(
                "Failed to get config descriptor {}: {}",
                index, e
            ))),
        }
    }

    fn handle(&self) -> Result<&DeviceHandle<Context>> {
        self.handle.as_ref().ok_or(DriverError::NotOpen)
    }
}

impl Transport for UsbTransport {
    fn describe(&self) -> String {
        format!(
            "usb {}",
            device_path(self.device.bus_number(), self.device.address())
        )
    }

    fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let handle = self.device.open().map_err(|e| {
            warn!("Failed to open {}: {}", self.describe(), e);
            DriverError::from(e)
        })?;

        let mut detached = false;
        match handle.kernel_driver_active(INTERFACE) {
            Ok(true) => {
                debug!(
                    "Detaching kernel driver from interface {} on {}",
                    INTERFACE,
                    self.describe()
                );
                handle.detach_kernel_driver(INTERFACE).map_err(|e| {
                    warn!("Failed to detach kernel driver: {}", e);
                    DriverError::Configuration(format!(
                        "Failed to detach kernel driver from interface {}: {}",
                        INTERFACE, e
                    ))
                })?;
                detached = true;
            }
            Ok(false) => {
                debug!("No kernel driver active on interface {}", INTERFACE);
            }
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    INTERFACE, e
                );
            }
        }

        if let Err(e) = handle.claim_interface(INTERFACE) {
            warn!("Failed to claim interface {}: {}", INTERFACE, e);
            if detached && let Err(e) = handle.attach_kernel_driver(INTERFACE) {
                debug!("Could not reattach kernel driver: {}", e);
            }
            return Err(match e {
                rusb::Error::Busy => DriverError::DeviceBusy,
                rusb::Error::NoDevice => DriverError::DeviceNotFound,
                other => DriverError::Configuration(format!(
                    "Failed to claim interface {}: {}",
                    INTERFACE, other
                )),
            });
        }

        debug!("Claimed interface {} on {}", INTERFACE, self.describe());
        self.kernel_driver_detached = detached;
        self.handle = Some(handle);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn endpoints(&mut self) -> Result<Vec<EndpointInfo>> {
        let descriptor = self.device.device_descriptor()?;
        let mut endpoints = Vec::new();

        for index in 0..descriptor.num_configurations() {
            let config = self.config_descriptor(index)?;
            for interface in config.interfaces() {
                for alt in interface.descriptors() {
                    for endpoint in alt.endpoint_descriptors() {
                        let info = EndpointInfo {
                            address: endpoint.address(),
                            transfer: map_transfer_type(endpoint.transfer_type()),
                            max_packet_size: endpoint.max_packet_size(),
                        };
                        debug!(
                            "Config {} interface {} alt {}: endpoint {:#04x} {:?}",
                            index,
                            alt.interface_number(),
                            alt.setting_number(),
                            info.address,
                            info.transfer
                        );
                        endpoints.push(info);
                    }
                }
            }
        }

        Ok(endpoints)
    }

    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let written = self.handle()?.write_bulk(endpoint, data, timeout)?;
        debug!(
            "Bulk OUT {:#04x}: {}/{} bytes",
            endpoint,
            written,
            data.len()
        );
        Ok(written)
    }

    fn read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let read = self.handle()?.read_bulk(endpoint, buf, timeout)?;
        debug!("Bulk IN {:#04x}: {} bytes", endpoint, read);
        Ok(read)
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(INTERFACE) {
                warn!("Failed to release interface {}: {}", INTERFACE, e);
            }

            if self.kernel_driver_detached {
                match handle.attach_kernel_driver(INTERFACE) {
                    Ok(()) => debug!("Reattached kernel driver to interface {}", INTERFACE),
                    Err(e) => debug!("Could not reattach kernel driver: {}", e),
                }
                self.kernel_driver_detached = false;
            }

            debug!("Closed {}", self.describe());
        }
    }
}

/// Host subsystem backed by a libusb context
pub struct UsbHost {
    context: Context,
    retry_config_descriptor: bool,
}

impl UsbHost {
    pub fn new() -> Result<Self> {
        Ok(Self {
            context: Context::new()?,
            retry_config_descriptor: true,
        })
    }

    pub fn with_config_retry(mut self, retry: bool) -> Self {
        self.retry_config_descriptor = retry;
        self
    }
}

impl HostSubsystem for UsbHost {
    type Device = Device<Context>;
    type Transport = UsbTransport;

    fn devices(&mut self, filter: &DeviceFilter) -> Result<Vec<Device<Context>>> {
        let devices = self.context.devices()?;

        let matching = devices
            .iter()
            .filter(|device| match device.device_descriptor() {
                Ok(desc) => filter.matches(desc.vendor_id(), desc.product_id()),
                Err(e) => {
                    debug!(
                        "Skipping bus={} addr={}: no device descriptor ({})",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    false
                }
            })
            .collect::<Vec<_>>();

        debug!("{} USB devices match {}", matching.len(), filter);
        Ok(matching)
    }

    fn resolve(&mut self, device: &Device<Context>) -> Result<DeviceLocation> {
        let descriptor = device
            .device_descriptor()
            .map_err(|e| DriverError::PathUnresolved(e.to_string()))?;
        let path = device_path(device.bus_number(), device.address());

        // The serial string needs a handle; a device we cannot open still gets
        // a session named after its path.
        let serial_number = descriptor.serial_number_string_index().and_then(|idx| {
            device
                .open()
                .and_then(|handle| handle.read_string_descriptor_ascii(idx))
                .ok()
        });

        let identifier = serial_number
            .filter(|serial| !serial.is_empty())
            .unwrap_or_else(|| path.clone());
        Ok(DeviceLocation::new(path, identifier))
    }

    fn transport(&mut self, device: Device<Context>) -> UsbTransport {
        UsbTransport::new(device).with_config_retry(self.retry_config_descriptor)
    }
}

/// Session path of the device at `bus`/`address`
fn device_path(bus: u8, address: u8) -> String {
    format!("{}-{}", bus, address)
}

fn map_transfer_type(transfer: rusb::TransferType) -> TransferKind {
    match transfer {
        rusb::TransferType::Control => TransferKind::Control,
        rusb::TransferType::Isochronous => TransferKind::Isochronous,
        rusb::TransferType::Bulk => TransferKind::Bulk,
        rusb::TransferType::Interrupt => TransferKind::Interrupt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path_is_unpadded() {
        assert_eq!(device_path(1, 4), "1-4");
        assert_eq!(device_path(12, 127), "12-127");
    }

    #[test]
    fn test_map_transfer_type() {
        assert_eq!(
            map_transfer_type(rusb::TransferType::Bulk),
            TransferKind::Bulk
        );
        assert_eq!(
            map_transfer_type(rusb::TransferType::Interrupt),
            TransferKind::Interrupt
        );
        assert_eq!(
            map_transfer_type(rusb::TransferType::Control),
            TransferKind::Control
        );
        assert_eq!(
            map_transfer_type(rusb::TransferType::Isochronous),
            TransferKind::Isochronous
        );
    }
}
