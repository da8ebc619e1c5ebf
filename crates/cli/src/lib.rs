//! Command-line clients for CapeMCA analyzers
//!
//! Shared pieces of the `capemca` (USB) and `capemca-uart` (serial) binaries:
//! configuration, the acquisition flow and CSV output.

pub mod acquire;
pub mod config;
pub mod output;

pub use acquire::{Acquisition, acquire, first_device};
pub use config::McaConfig;
