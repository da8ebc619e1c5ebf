//! Host-to-device commands
//!
//! Every exchange with the MCA starts with a 2-byte command `[opcode, parameter]`.
//! The reply length is fully determined by the command, so the host always knows
//! how many bytes to read back.

use crate::error::{ProtocolError, Result};
use crate::reply::PacketZero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every command on the wire
pub const COMMAND_LEN: usize = 2;

/// Number of bytes in one spectrum "unit" selected by the request type
pub const SPECTRUM_UNIT_BYTES: usize = 1024;

/// Bit of the request type that asks for packet zero after the spectrum
pub const PACKET_ZERO_FLAG: u8 = 0x20;

/// Mask of the spectrum-size bits of the request type
const SPECTRUM_UNITS_MASK: u8 = 0x1f;

/// Spectrum unit counts the firmware accepts
const VALID_UNITS: [u8; 6] = [0, 1, 2, 4, 8, 16];

/// Command opcodes understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Query spectrum and/or packet zero, as selected by the parameter
    Query = 0,
    /// Zero the accumulated spectrum; the device echoes the command back
    Zero = 1,
}

/// A 2-byte command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub opcode: Opcode,
    pub parameter: u8,
}

impl Command {
    /// Query with the given request type
    pub fn query(request: RequestType) -> Self {
        Self {
            opcode: Opcode::Query,
            parameter: request.value(),
        }
    }

    /// Zero the spectrum (`{1, 1}`)
    pub fn zero() -> Self {
        Self {
            opcode: Opcode::Zero,
            parameter: 1,
        }
    }

    /// Wire representation
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        [self.opcode as u8, self.parameter]
    }

    /// Number of reply bytes the device sends for this command
    pub fn reply_len(&self) -> usize {
        match self.opcode {
            Opcode::Query => RequestType(self.parameter).reply_len(),
            Opcode::Zero => COMMAND_LEN,
        }
    }
}

/// Query parameter
///
/// The low 5 bits select the spectrum size in KiB, bit 5 appends packet zero.
/// A request without a spectrum part always returns packet zero, so `0` and `32`
/// are equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestType(u8);

impl RequestType {
    /// Packet zero only
    pub const PACKET_ZERO: RequestType = RequestType(0);

    /// Validate a raw request type as given on a command line
    pub fn new(value: u32) -> Result<Self> {
        let raw = u8::try_from(value).map_err(|_| ProtocolError::InvalidRequestType(value))?;
        if raw > (PACKET_ZERO_FLAG | SPECTRUM_UNITS_MASK)
            || !VALID_UNITS.contains(&(raw & SPECTRUM_UNITS_MASK))
        {
            return Err(ProtocolError::InvalidRequestType(value));
        }
        Ok(Self(raw))
    }

    /// Spectrum of the given size, optionally followed by packet zero
    pub fn spectrum(size: SpectrumSize, with_packet_zero: bool) -> Self {
        let units = size.request_units();
        if with_packet_zero {
            Self(units | PACKET_ZERO_FLAG)
        } else {
            Self(units)
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Bytes of spectrum data at the start of the reply
    pub fn spectrum_bytes(&self) -> usize {
        SPECTRUM_UNIT_BYTES * usize::from(self.0 & SPECTRUM_UNITS_MASK)
    }

    /// Number of spectrum channels in the reply
    pub fn spectrum_channels(&self) -> usize {
        self.spectrum_bytes() / 4
    }

    /// Whether packet zero follows the spectrum
    pub fn includes_packet_zero(&self) -> bool {
        self.0 & SPECTRUM_UNITS_MASK == 0 || self.0 & PACKET_ZERO_FLAG != 0
    }

    /// Total reply length in bytes
    pub fn reply_len(&self) -> usize {
        let packet = if self.includes_packet_zero() {
            PacketZero::SIZE
        } else {
            0
        };
        self.spectrum_bytes() + packet
    }
}

impl Default for RequestType {
    /// 8 KiB spectrum (2048 channels), the UART client's default
    fn default() -> Self {
        Self(8)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ProtocolError::ParseRequestType(s.to_string()))?;
        Self::new(value)
    }
}

/// Spectrum sizes produced by the firmware builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SpectrumSize {
    #[default]
    Channels512,
    Channels4096,
}

impl SpectrumSize {
    pub fn channels(&self) -> usize {
        match self {
            SpectrumSize::Channels512 => 512,
            SpectrumSize::Channels4096 => 4096,
        }
    }

    /// Spectrum size in bytes on the wire
    pub fn bytes(&self) -> usize {
        self.channels() * 4
    }

    fn request_units(&self) -> u8 {
        (self.bytes() / SPECTRUM_UNIT_BYTES) as u8
    }
}

impl TryFrom<u32> for SpectrumSize {
    type Error = ProtocolError;

    fn try_from(channels: u32) -> Result<Self> {
        match channels {
            512 => Ok(SpectrumSize::Channels512),
            4096 => Ok(SpectrumSize::Channels4096),
            other => Err(ProtocolError::InvalidSpectrumSize(other)),
        }
    }
}

impl From<SpectrumSize> for u32 {
    fn from(size: SpectrumSize) -> u32 {
        size.channels() as u32
    }
}
