//! Integration tests for the acquisition flow
//!
//! Runs the connect / zero / request / read phases against emulated
//! analyzers and checks the CSV report.

use cli::output::write_report;
use cli::{Acquisition, acquire};
use common::DeviceFilter;
use driver::test_utils::{MockDevice, MockHost};
use driver::{DeviceLocation, DeviceRegistry};
use protocol::{PacketZero, RequestType, SpectrumSize};

fn registry(host: &mut MockHost) -> DeviceRegistry<driver::test_utils::MockTransport> {
    let mut registry = DeviceRegistry::new();
    registry
        .enumerate(host, &DeviceFilter::default())
        .unwrap();
    registry
}

fn report(acquisition: &Acquisition) -> String {
    let mut out = Vec::new();
    write_report(&mut out, acquisition).unwrap();
    String::from_utf8(out).unwrap()
}

mod summing {
    use super::*;

    #[test]
    fn test_spectra_are_summed_across_devices() {
        let mut host = MockHost::new()
            .with_spectrum_device("1-2", "MCA0001", vec![0, 1, 2])
            .with_spectrum_device("1-3", "MCA0002", vec![5, 10, 20]);
        let mut registry = registry(&mut host);

        let request = RequestType::spectrum(SpectrumSize::Channels512, false);
        let acquisition = acquire(&mut registry, request, false);
        assert!(acquisition.is_complete());
        assert_eq!(acquisition.replied, 2);

        let spectrum = acquisition.spectrum.as_ref().unwrap();
        assert_eq!(spectrum.channels(), 512);
        assert_eq!(&spectrum.counts()[..3], &[5, 11, 22]);

        let text = report(&acquisition);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("channel,count"));
        assert_eq!(lines.next(), Some("1,11"));
        assert_eq!(lines.next(), Some("2,22"));
        assert_eq!(text.lines().count(), 512);
    }

    #[test]
    fn test_zero_before_request() {
        let mut host = MockHost::new().with_spectrum_device("1-2", "MCA0001", vec![4; 512]);
        let mut registry = registry(&mut host);

        let request = RequestType::spectrum(SpectrumSize::Channels512, false);
        let acquisition = acquire(&mut registry, request, true);
        assert!(acquisition.is_complete());
        assert_eq!(acquisition.spectrum.unwrap().total(), 0);
        assert_eq!(host.logs()[0].writes(), vec![vec![1, 1], vec![0, 2]]);
    }

    #[test]
    fn test_spectrum_and_packet_zero_per_device() {
        let mut host = MockHost::new()
            .with_device("1-2", "MCA0001")
            .with_device("1-3", "MCA0002");
        let mut registry = registry(&mut host);

        let request = RequestType::spectrum(SpectrumSize::Channels512, true);
        let acquisition = acquire(&mut registry, request, false);
        let names: Vec<&str> = acquisition
            .packets
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["MCA0001", "MCA0002"]);

        let text = report(&acquisition);
        assert!(text.contains("\n\ncps,totalCount,totalPulseTime,usPerInterval,totalIntervals,capemcaId\n"));
        assert!(text.ends_with("0,0,0,0,0,0\n0,0,0,0,0,0\n"));
    }

    #[test]
    fn test_detector_array_packet_reports_direction() {
        let mut host = MockHost::new().with_device("1-2", "MCA0001").with(MockDevice {
            vendor_id: common::CAPEMCA_VENDOR_ID,
            product_id: common::CAPEMCA_PRODUCT_ID,
            location: Some(DeviceLocation::new("1-3", "ARRAY01")),
            counts: Vec::new(),
            packet_zero: PacketZero {
                capemca_id: 9,
                detectors: 3,
                cpi_array: 120,
                count_in_range_array: 60,
                direction: [1.0, 0.0, -0.5],
                ..PacketZero::default()
            },
        });
        let mut registry = registry(&mut host);

        let acquisition = acquire(&mut registry, RequestType::PACKET_ZERO, false);
        assert!(acquisition.is_complete());
        assert_eq!(acquisition.packets.len(), 2);
        assert!(acquisition.packets[1].1.is_array());

        let text = report(&acquisition);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "cps,totalCount,totalPulseTime,usPerInterval,totalIntervals,capemcaId,\
                 detectors,cpiArray,countInRangeArray,xDirection,yDirection,zDirection",
                "0,0,0,0,0,0,0,0,0,0,0,0",
                "0,0,0,0,0,9,3,120,60,1,0,-0.5",
            ]
        );
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_failed_device_is_left_out() {
        let mut host = MockHost::new()
            .with_spectrum_device("1-2", "MCA0001", vec![0, 3])
            .with(MockDevice {
                vendor_id: common::CAPEMCA_VENDOR_ID,
                product_id: common::CAPEMCA_PRODUCT_ID,
                location: Some(DeviceLocation::new("", "")),
                counts: vec![0, 100],
                packet_zero: PacketZero::default(),
            });
        let mut registry = registry(&mut host);
        assert_eq!(registry.len(), 2);

        let request = RequestType::spectrum(SpectrumSize::Channels512, false);
        let acquisition = acquire(&mut registry, request, false);
        assert_eq!(acquisition.replied, 1);
        assert_eq!(acquisition.failures, 1);
        assert!(!acquisition.is_complete());
        assert_eq!(acquisition.spectrum.unwrap().counts()[1], 3);
    }
}
