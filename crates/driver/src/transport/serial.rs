//! Serial (UART) transport
//!
//! The UART firmware speaks the same request/reply protocol over a plain byte
//! stream. There are no endpoints, so the transport reports a fixed virtual
//! bulk pair and ignores the endpoint argument of `read` and `write`.

use super::{DeviceLocation, EndpointInfo, HostSubsystem, Transport};
use crate::error::{DriverError, Result};
use common::DeviceFilter;
use serialport::{
    ClearBuffer, FlowControl, SerialPort, SerialPortInfo, SerialPortType, UsbPortInfo,
};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub use serialport::{DataBits, Parity, StopBits};

/// Virtual bulk OUT endpoint reported by serial transports
pub const SERIAL_OUT_ENDPOINT: u8 = 0x01;

/// Virtual bulk IN endpoint reported by serial transports
pub const SERIAL_IN_ENDPOINT: u8 = 0x81;

/// Line settings for a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Maximum wait for the next byte
    pub timeout: Duration,
}

impl SerialSettings {
    /// 8N1 at `baud_rate` with a one second byte timeout
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(1000),
        }
    }
}

pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn port(&mut self, timeout: Duration) -> Result<&mut Box<dyn SerialPort>> {
        let port = self.port.as_mut().ok_or(DriverError::NotOpen)?;
        if port.timeout() != timeout {
            port.set_timeout(timeout)?;
        }
        Ok(port)
    }
}

impl Transport for SerialTransport {
    fn describe(&self) -> String {
        format!("serial {} @ {}", self.settings.port, self.settings.baud_rate)
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        if self.settings.port.is_empty() {
            return Err(DriverError::PathUnset);
        }

        let mut port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .parity(self.settings.parity)
            .stop_bits(self.settings.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(self.settings.timeout)
            .open()?;

        // The port is dropped, and closed, if any of these fail
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;
        port.clear(ClearBuffer::All)?;

        debug!("Opened {}", self.describe());
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn endpoints(&mut self) -> Result<Vec<EndpointInfo>> {
        Ok(vec![
            EndpointInfo::bulk(SERIAL_OUT_ENDPOINT, 64),
            EndpointInfo::bulk(SERIAL_IN_ENDPOINT, 64),
        ])
    }

    fn write(&mut self, _endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let port = self.port(timeout)?;
        let written = port.write(data)?;
        port.flush()?;
        debug!("Serial write: {}/{} bytes", written, data.len());
        Ok(written)
    }

    fn read(&mut self, _endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let read = self.port(timeout)?.read(buf)?;
        debug!("Serial read: {} bytes", read);
        Ok(read)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed {}", self.describe());
        }
    }
}

/// Host subsystem listing USB-serial ports
pub struct SerialHost {
    template: SerialSettings,
}

impl SerialHost {
    /// Ports found by this host are opened with `template`'s line settings
    pub fn new(template: SerialSettings) -> Self {
        Self { template }
    }
}

impl HostSubsystem for SerialHost {
    type Device = SerialPortInfo;
    type Transport = SerialTransport;

    fn devices(&mut self, filter: &DeviceFilter) -> Result<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()?;
        let matching = ports
            .into_iter()
            .filter(|info| match &info.port_type {
                SerialPortType::UsbPort(UsbPortInfo { vid, pid, .. }) => {
                    filter.matches(*vid, *pid)
                }
                _ => false,
            })
            .collect::<Vec<_>>();

        debug!("{} serial ports match {}", matching.len(), filter);
        Ok(matching)
    }

    fn resolve(&mut self, info: &SerialPortInfo) -> Result<DeviceLocation> {
        if info.port_name.is_empty() {
            return Err(DriverError::PathUnresolved(
                "serial port has no name".to_string(),
            ));
        }

        let identifier = match &info.port_type {
            SerialPortType::UsbPort(UsbPortInfo {
                serial_number: Some(serial),
                ..
            }) if !serial.is_empty() => serial.clone(),
            _ => info.port_name.clone(),
        };
        Ok(DeviceLocation::new(info.port_name.clone(), identifier))
    }

    fn transport(&mut self, info: SerialPortInfo) -> SerialTransport {
        SerialTransport::new(SerialSettings {
            port: info.port_name,
            ..self.template.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_8n1() {
        let settings = SerialSettings::new("/dev/ttyACM0", 115_200);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_closed_transport_rejects_transfers() {
        let mut transport = SerialTransport::new(SerialSettings::new("/dev/ttyACM0", 115_200));
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write(SERIAL_OUT_ENDPOINT, &[0, 8], Duration::from_secs(1)),
            Err(DriverError::NotOpen)
        ));
        let mut buf = [0u8; 4];
        assert!(matches!(
            transport.read(SERIAL_IN_ENDPOINT, &mut buf, Duration::from_secs(1)),
            Err(DriverError::NotOpen)
        ));
    }

    #[test]
    fn test_empty_port_name_is_path_unset() {
        let mut transport = SerialTransport::new(SerialSettings::new("", 115_200));
        assert!(matches!(transport.open(), Err(DriverError::PathUnset)));
    }

    #[test]
    fn test_virtual_endpoints() {
        let mut transport = SerialTransport::new(SerialSettings::new("COM3", 9600));
        let endpoints = transport.endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().any(|e| e.address == SERIAL_IN_ENDPOINT));
        assert!(endpoints.iter().any(|e| e.address == SERIAL_OUT_ENDPOINT));
    }

    #[test]
    fn test_resolve_prefers_serial_number() {
        let mut host = SerialHost::new(SerialSettings::new("", 115_200));
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x4701,
                pid: 0x0290,
                serial_number: Some("MCA0042".to_string()),
                manufacturer: None,
                product: None,
            }),
        };
        let location = host.resolve(&info).unwrap();
        assert_eq!(location.path, "/dev/ttyACM0");
        assert_eq!(location.identifier, "MCA0042");

        let transport = host.transport(info);
        assert_eq!(transport.settings().port, "/dev/ttyACM0");
        assert_eq!(transport.settings().baud_rate, 115_200);
    }
}
