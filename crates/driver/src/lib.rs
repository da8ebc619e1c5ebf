//! Host driver for CapeMCA multichannel analyzers
//!
//! Finds analyzers through a host subsystem (libusb or USB-serial ports),
//! keeps one [`DeviceSession`] per device in a [`DeviceRegistry`], and runs
//! the 2-byte command / fixed-length reply protocol over the session's bulk
//! endpoint pair.
//!
//! ```no_run
//! use common::DeviceFilter;
//! use driver::{DeviceRegistry, UsbHost};
//! use protocol::{RequestType, SpectrumSize};
//!
//! # fn main() -> driver::Result<()> {
//! let mut host = UsbHost::new()?;
//! let mut registry = DeviceRegistry::new();
//! registry.enumerate(&mut host, &DeviceFilter::default())?;
//!
//! for id in registry.ids() {
//!     if let Some(session) = registry.get_mut(id) {
//!         session.connect()?;
//!         let reply = session.request(RequestType::spectrum(SpectrumSize::Channels512, true))?;
//!         println!("{}: {:?}", session.identifier(), reply.packet_zero);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mca;
pub mod registry;
pub mod session;
pub mod test_utils;
pub mod transport;

pub use error::{DriverError, Result};
pub use registry::DeviceRegistry;
pub use session::{DEFAULT_TIMEOUT, DeviceSession, Endpoints, SessionState};
pub use transport::{
    DataBits, DeviceLocation, Direction, EndpointInfo, HostSubsystem, Parity, SerialHost,
    SerialSettings, SerialTransport, StopBits, TransferKind, Transport, UsbHost, UsbTransport,
};
