//! CSV output
//!
//! Spectra and packet zero rows go to stdout in the format the CapeMCA tools
//! have always printed; progress messages go to the log on stderr.

use crate::acquire::Acquisition;
use protocol::{PacketZero, Spectrum};
use std::io::{self, Write};

pub const SPECTRUM_HEADER: &str = "channel,count";

pub const PACKET_ZERO_HEADER: &str =
    "cps,totalCount,totalPulseTime,usPerInterval,totalIntervals,capemcaId";

/// Extra columns written when a detector array reports
pub const ARRAY_HEADER: &str =
    "detectors,cpiArray,countInRangeArray,xDirection,yDirection,zDirection";

/// Version line printed by `-v`
pub fn version_banner(tool: &str) -> String {
    format!(
        "CapeMCA {} {}-bit Version {}",
        tool,
        usize::BITS,
        env!("CARGO_PKG_VERSION")
    )
}

/// Write `channel,count` rows; channel 0 holds no counts and is skipped
pub fn write_spectrum<W: Write>(out: &mut W, spectrum: &Spectrum) -> io::Result<()> {
    writeln!(out, "{}", SPECTRUM_HEADER)?;
    for (channel, count) in spectrum.counts().iter().enumerate().skip(1) {
        writeln!(out, "{},{}", channel, count)?;
    }
    Ok(())
}

/// Write the header and one row per packet
///
/// The detector-array columns are added to every row when any packet comes
/// from an array.
pub fn write_packet_zero<'a, W, I>(out: &mut W, packets: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PacketZero>,
{
    let packets: Vec<&PacketZero> = packets.into_iter().collect();
    let array = packets.iter().any(|packet| packet.is_array());

    if array {
        writeln!(out, "{},{}", PACKET_ZERO_HEADER, ARRAY_HEADER)?;
    } else {
        writeln!(out, "{}", PACKET_ZERO_HEADER)?;
    }
    for packet in packets {
        write!(
            out,
            "{},{},{},{},{},{}",
            packet.cps,
            packet.total_count,
            packet.total_pulse_time,
            packet.us_per_interval,
            packet.total_intervals,
            packet.capemca_id
        )?;
        if array {
            let [x, y, z] = packet.direction;
            write!(
                out,
                ",{},{},{},{},{},{}",
                packet.detectors, packet.cpi_array, packet.count_in_range_array, x, y, z
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write everything an acquisition produced
pub fn write_report<W: Write>(out: &mut W, acquisition: &Acquisition) -> io::Result<()> {
    if let Some(spectrum) = &acquisition.spectrum {
        write_spectrum(out, spectrum)?;
    }
    if !acquisition.packets.is_empty() {
        if acquisition.spectrum.is_some() {
            writeln!(out)?;
        }
        write_packet_zero(out, acquisition.packets.iter().map(|(_, packet)| packet))?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_skips_channel_zero() {
        let spectrum = Spectrum::from_counts(vec![99, 1, 2, 3]);
        let mut out = Vec::new();
        write_spectrum(&mut out, &spectrum).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "channel,count\n1,1\n2,2\n3,3\n"
        );
    }

    #[test]
    fn test_packet_zero_row() {
        let packet = PacketZero {
            cps: 12.5,
            total_count: 4096.0,
            total_pulse_time: 0.25,
            us_per_interval: 1_000_000,
            total_intervals: 30,
            capemca_id: 7,
            ..PacketZero::default()
        };
        let mut out = Vec::new();
        write_packet_zero(&mut out, [&packet]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}\n12.5,4096,0.25,1000000,30,7\n", PACKET_ZERO_HEADER)
        );
    }

    #[test]
    fn test_zero_packet_prints_zeros() {
        let mut out = Vec::new();
        write_packet_zero(&mut out, [&PacketZero::default()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("0,0,0,0,0,0"));
    }

    #[test]
    fn test_array_packet_adds_columns() {
        let single = PacketZero {
            capemca_id: 1,
            detectors: 1,
            ..PacketZero::default()
        };
        let array = PacketZero {
            cps: 3.0,
            capemca_id: 2,
            detectors: 3,
            cpi_array: 90,
            count_in_range_array: 45,
            direction: [0.5, -0.25, 1.0],
            ..PacketZero::default()
        };
        let mut out = Vec::new();
        write_packet_zero(&mut out, [&single, &array]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            format!("{},{}", PACKET_ZERO_HEADER, ARRAY_HEADER)
        );
        assert_eq!(lines[1], "0,0,0,0,0,1,1,0,0,0,0,0");
        assert_eq!(lines[2], "3,0,0,0,0,2,3,90,45,0.5,-0.25,1");
    }

    #[test]
    fn test_single_detector_keeps_short_header() {
        let packet = PacketZero {
            detectors: 1,
            ..PacketZero::default()
        };
        let mut out = Vec::new();
        write_packet_zero(&mut out, [&packet]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some(PACKET_ZERO_HEADER));
        assert!(!text.contains("detectors"));
    }

    #[test]
    fn test_version_banner() {
        let banner = version_banner("CLI");
        assert!(banner.starts_with("CapeMCA CLI "));
        assert!(banner.ends_with(&format!("-bit Version {}", env!("CARGO_PKG_VERSION"))));
    }
}
