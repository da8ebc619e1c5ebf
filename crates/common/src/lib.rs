//! Common utilities for the CapeMCA host tools
//!
//! This crate provides functionality shared between the driver and the
//! command-line clients: the owned device list container, USB identifiers and
//! VID:PID filters, error handling and logging setup.

pub mod error;
pub mod list;
pub mod logging;
pub mod usb_types;

pub use error::{Error, Result};
pub use list::{Iter, List, NodeId};
pub use logging::setup_logging;
pub use usb_types::{CAPEMCA_PRODUCT_ID, CAPEMCA_VENDOR_ID, DeviceFilter};
