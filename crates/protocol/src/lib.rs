//! Wire protocol of the CapeMCA multichannel analyzer
//!
//! The host writes a 2-byte command and reads back a reply whose length is
//! fixed by the command. This crate encodes commands and decodes replies; it
//! does no I/O.
//!
//! # Example
//!
//! ```
//! use protocol::{Command, Reply, RequestType, SpectrumSize};
//!
//! let request = RequestType::spectrum(SpectrumSize::Channels512, true);
//! let command = Command::query(request);
//! assert_eq!(command.encode(), [0, 34]);
//! assert_eq!(command.reply_len(), 512 * 4 + 64);
//!
//! let raw = vec![0u8; command.reply_len()];
//! let reply = Reply::decode(request, &raw).unwrap();
//! assert_eq!(reply.spectrum.unwrap().channels(), 512);
//! assert_eq!(reply.packet_zero.unwrap().capemca_id, 0);
//! ```

pub mod command;
pub mod error;
pub mod reply;

pub use command::{
    COMMAND_LEN, Command, Opcode, PACKET_ZERO_FLAG, RequestType, SPECTRUM_UNIT_BYTES,
    SpectrumSize,
};
pub use error::{ProtocolError, Result};
pub use reply::{PacketZero, Reply, Spectrum};
