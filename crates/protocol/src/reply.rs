//! Device-to-host replies
//!
//! A query reply is the spectrum (little-endian `u32` counts, one per channel)
//! followed by packet zero when the request type asks for it.

use crate::command::RequestType;
use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BufMut};

/// Energy spectrum: one count per channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Spectrum {
    counts: Vec<u32>,
}

impl Spectrum {
    /// Empty spectrum with `channels` zeroed counts
    pub fn zeroed(channels: usize) -> Self {
        Self {
            counts: vec![0; channels],
        }
    }

    pub fn from_counts(counts: Vec<u32>) -> Self {
        Self { counts }
    }

    /// Decode little-endian counts
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(ProtocolError::MisalignedSpectrum(bytes.len()));
        }
        let mut counts = vec![0u32; bytes.len() / 4];
        LittleEndian::read_u32_into(bytes, &mut counts);
        Ok(Self { counts })
    }

    /// Little-endian wire representation
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.counts.len() * 4];
        LittleEndian::write_u32_into(&self.counts, &mut bytes);
        bytes
    }

    pub fn channels(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Sum of all channel counts
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Add another spectrum channel by channel
    ///
    /// Grows to the longer of the two; counts saturate at `u32::MAX`.
    pub fn accumulate(&mut self, other: &Spectrum) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (sum, &count) in self.counts.iter_mut().zip(&other.counts) {
            *sum = sum.saturating_add(count);
        }
    }
}

/// Status block returned for `cmd[0, 0]` or appended when bit 5 of the request is set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PacketZero {
    /// Count rate of the most recent acquisition interval
    pub cps: f32,
    /// Sum of all spectrum data in all channels
    pub total_count: f32,
    /// Total time in seconds inside pulses
    pub total_pulse_time: f32,
    /// Duration of the most recent interval in microseconds
    pub us_per_interval: u32,
    /// Number of intervals used to acquire data
    pub total_intervals: u32,
    /// Device id configured in the firmware's USB descriptors
    pub capemca_id: u32,
    /// Number of detectors in the array
    pub detectors: u32,
    /// Counts per interval across all detectors for the most recent interval
    pub cpi_array: u32,
    /// Count in channel range across all detectors
    pub count_in_range_array: u32,
    /// Source direction (x, y, z) from the counts-in-range vector
    pub direction: [f32; 3],
    pub reserved: [u32; 4],
}

impl PacketZero {
    /// Size on the wire
    pub const SIZE: usize = 64;

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::BufferTooSmall {
                needed: Self::SIZE,
                available: bytes.len(),
            });
        }

        let mut buf = &bytes[..Self::SIZE];
        Ok(Self {
            cps: buf.get_f32_le(),
            total_count: buf.get_f32_le(),
            total_pulse_time: buf.get_f32_le(),
            us_per_interval: buf.get_u32_le(),
            total_intervals: buf.get_u32_le(),
            capemca_id: buf.get_u32_le(),
            detectors: buf.get_u32_le(),
            cpi_array: buf.get_u32_le(),
            count_in_range_array: buf.get_u32_le(),
            direction: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            reserved: [
                buf.get_u32_le(),
                buf.get_u32_le(),
                buf.get_u32_le(),
                buf.get_u32_le(),
            ],
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut buf = &mut out[..];
        buf.put_f32_le(self.cps);
        buf.put_f32_le(self.total_count);
        buf.put_f32_le(self.total_pulse_time);
        buf.put_u32_le(self.us_per_interval);
        buf.put_u32_le(self.total_intervals);
        buf.put_u32_le(self.capemca_id);
        buf.put_u32_le(self.detectors);
        buf.put_u32_le(self.cpi_array);
        buf.put_u32_le(self.count_in_range_array);
        for component in self.direction {
            buf.put_f32_le(component);
        }
        for word in self.reserved {
            buf.put_u32_le(word);
        }
        out
    }

    /// Whether the detector-array fields carry data
    pub fn is_array(&self) -> bool {
        self.detectors > 1
    }
}

/// Decoded reply to a query command
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub spectrum: Option<Spectrum>,
    pub packet_zero: Option<PacketZero>,
}

impl Reply {
    /// Split a raw reply according to the request that produced it
    pub fn decode(request: RequestType, bytes: &[u8]) -> Result<Self> {
        let expected = request.reply_len();
        if bytes.len() != expected {
            return Err(ProtocolError::UnexpectedLength {
                expected,
                actual: bytes.len(),
            });
        }

        let (spectrum_bytes, packet_bytes) = bytes.split_at(request.spectrum_bytes());
        let spectrum = if spectrum_bytes.is_empty() {
            None
        } else {
            Some(Spectrum::decode(spectrum_bytes)?)
        };
        let packet_zero = if request.includes_packet_zero() {
            Some(PacketZero::decode(packet_bytes)?)
        } else {
            None
        };

        Ok(Self {
            spectrum,
            packet_zero,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_decode_little_endian() {
        let bytes = [1, 0, 0, 0, 0, 1, 0, 0, 0xff, 0xff, 0xff, 0xff];
        let spectrum = Spectrum::decode(&bytes).unwrap();
        assert_eq!(spectrum.counts(), &[1, 256, u32::MAX]);
        assert_eq!(spectrum.channels(), 3);
    }

    #[test]
    fn test_spectrum_rejects_partial_count() {
        assert_eq!(
            Spectrum::decode(&[0u8; 7]),
            Err(ProtocolError::MisalignedSpectrum(7))
        );
    }

    #[test]
    fn test_spectrum_accumulate_saturates() {
        let mut sum = Spectrum::from_counts(vec![1, u32::MAX - 1]);
        sum.accumulate(&Spectrum::from_counts(vec![2, 5, 7]));
        assert_eq!(sum.counts(), &[3, u32::MAX, 7]);
        assert_eq!(sum.total(), 10 + u64::from(u32::MAX));
    }

    #[test]
    fn test_packet_zero_all_zero() {
        let packet = PacketZero::decode(&[0u8; 64]).unwrap();
        assert_eq!(packet.cps, 0.0);
        assert_eq!(packet.total_count, 0.0);
        assert_eq!(packet.capemca_id, 0);
        assert!(!packet.is_array());
    }

    #[test]
    fn test_packet_zero_field_offsets() {
        let mut bytes = [0u8; 64];
        bytes[0..4].copy_from_slice(&12.5f32.to_le_bytes());
        bytes[20..24].copy_from_slice(&7u32.to_le_bytes());
        bytes[24..28].copy_from_slice(&3u32.to_le_bytes());
        bytes[40..44].copy_from_slice(&(-1.0f32).to_le_bytes());
        bytes[60..64].copy_from_slice(&0xdead_beefu32.to_le_bytes());

        let packet = PacketZero::decode(&bytes).unwrap();
        assert_eq!(packet.cps, 12.5);
        assert_eq!(packet.capemca_id, 7);
        assert_eq!(packet.detectors, 3);
        assert_eq!(packet.direction[1], -1.0);
        assert_eq!(packet.reserved[3], 0xdead_beef);
        assert!(packet.is_array());
        assert_eq!(packet.encode(), bytes);
    }

    #[test]
    fn test_packet_zero_too_short() {
        assert_eq!(
            PacketZero::decode(&[0u8; 63]),
            Err(ProtocolError::BufferTooSmall {
                needed: 64,
                available: 63
            })
        );
    }

    #[test]
    fn test_reply_split() {
        let request = RequestType::new(33).unwrap();
        let spectrum = Spectrum::from_counts((0..256).collect());
        let packet = PacketZero {
            capemca_id: 42,
            ..Default::default()
        };
        let mut raw = spectrum.encode();
        raw.extend_from_slice(&packet.encode());

        let reply = Reply::decode(request, &raw).unwrap();
        assert_eq!(reply.spectrum, Some(spectrum));
        assert_eq!(reply.packet_zero.map(|p| p.capemca_id), Some(42));
    }

    #[test]
    fn test_reply_wrong_length() {
        let request = RequestType::new(2).unwrap();
        assert_eq!(
            Reply::decode(request, &[0u8; 480]),
            Err(ProtocolError::UnexpectedLength {
                expected: 2048,
                actual: 480
            })
        );
    }
}
