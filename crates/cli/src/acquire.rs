//! Spectrum acquisition across every session in a registry
//!
//! Runs in phases so that all analyzers integrate over the same window:
//! connect every device, optionally zero them, send the request to every
//! connected device, then collect the replies and sum the spectra.

use common::DeviceFilter;
use driver::{DeviceRegistry, DeviceSession, HostSubsystem, Transport};
use protocol::{PacketZero, RequestType, Spectrum};
use std::time::Duration;
use tracing::{info, warn};

/// Result of one acquisition pass
#[derive(Debug, Clone, Default)]
pub struct Acquisition {
    /// Channel-wise sum over every device that replied, when a spectrum was requested
    pub spectrum: Option<Spectrum>,
    /// Packet zero per device identifier, in enumeration order
    pub packets: Vec<(String, PacketZero)>,
    /// Devices that replied in full
    pub replied: usize,
    /// Devices that failed at any step
    pub failures: usize,
}

impl Acquisition {
    /// Every device replied
    pub fn is_complete(&self) -> bool {
        self.failures == 0 && self.replied > 0
    }
}

/// Query every session in `registry` with `request`
///
/// A device that fails at any step is logged and left out of the result.
pub fn acquire<T: Transport>(
    registry: &mut DeviceRegistry<T>,
    request: RequestType,
    zero: bool,
) -> Acquisition {
    let mut acquisition = Acquisition {
        spectrum: (request.spectrum_channels() > 0)
            .then(|| Spectrum::zeroed(request.spectrum_channels())),
        ..Acquisition::default()
    };

    let mut active = Vec::new();
    for (n, id) in registry.ids().into_iter().enumerate() {
        let Some(session) = registry.get_mut(id) else {
            continue;
        };
        match session.connect() {
            Ok(()) => {
                info!("{}: {} : connected", n + 1, session.identifier());
                active.push(id);
            }
            Err(e) => {
                warn!("{}: {} : connect failed: {}", n + 1, session.identifier(), e);
                acquisition.failures += 1;
            }
        }
    }

    if zero {
        active.retain(|&id| {
            let Some(session) = registry.get_mut(id) else {
                return false;
            };
            match session.zero_spectrum() {
                Ok(true) => {
                    info!("Zero command was processed by {}", session.identifier());
                    true
                }
                Ok(false) => {
                    warn!("{} did not acknowledge the zero command", session.identifier());
                    true
                }
                Err(e) => {
                    warn!("{}: zero failed: {}", session.identifier(), e);
                    acquisition.failures += 1;
                    false
                }
            }
        });
    }

    info!("Requesting data from {} MCAs", active.len());
    active.retain(|&id| {
        let Some(session) = registry.get_mut(id) else {
            return false;
        };
        match session.send_request(request) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: request failed: {}", session.identifier(), e);
                acquisition.failures += 1;
                false
            }
        }
    });

    info!("Reading data from {} MCAs", active.len());
    for id in active {
        let Some(session) = registry.get_mut(id) else {
            continue;
        };
        match session.receive_reply(request) {
            Ok(reply) => {
                if let (Some(sum), Some(spectrum)) =
                    (acquisition.spectrum.as_mut(), reply.spectrum.as_ref())
                {
                    sum.accumulate(spectrum);
                }
                if let Some(packet) = reply.packet_zero {
                    acquisition
                        .packets
                        .push((session.identifier().to_string(), packet));
                }
                acquisition.replied += 1;
            }
            Err(e) => {
                warn!("{}: data transmission error: {}", session.identifier(), e);
                acquisition.failures += 1;
            }
        }
    }

    acquisition
}

/// Session for the first device `host` can resolve, if any
pub fn first_device<H: HostSubsystem>(
    host: &mut H,
    filter: &DeviceFilter,
    timeout: Duration,
) -> driver::Result<Option<DeviceSession<H::Transport>>> {
    for device in host.devices(filter)? {
        match host.resolve(&device) {
            Ok(location) => {
                info!("Using {}", location);
                let transport = host.transport(device);
                return Ok(Some(
                    DeviceSession::new(location, transport).with_timeout(timeout),
                ));
            }
            Err(e) => warn!("Skipping device: {}", e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver::test_utils::MockHost;
    use protocol::SpectrumSize;

    #[test]
    fn test_packet_zero_only_has_no_spectrum() {
        let mut host = MockHost::new().with_device("1-2", "MCA0001");
        let mut registry = DeviceRegistry::new();
        registry
            .enumerate(&mut host, &DeviceFilter::default())
            .unwrap();

        let acquisition = acquire(&mut registry, RequestType::PACKET_ZERO, false);
        assert!(acquisition.spectrum.is_none());
        assert_eq!(acquisition.packets.len(), 1);
        assert_eq!(acquisition.packets[0].0, "MCA0001");
        assert!(acquisition.is_complete());
    }

    #[test]
    fn test_empty_registry_is_incomplete() {
        let mut registry: DeviceRegistry<driver::test_utils::MockTransport> =
            DeviceRegistry::new();
        let acquisition = acquire(
            &mut registry,
            RequestType::spectrum(SpectrumSize::Channels512, false),
            false,
        );
        assert_eq!(acquisition.replied, 0);
        assert!(!acquisition.is_complete());
    }

    #[test]
    fn test_first_device_skips_unresolvable() {
        let mut host = MockHost::new()
            .with_unresolvable_device()
            .with_device("/dev/ttyACM1", "MCA0009");

        let session = first_device(&mut host, &DeviceFilter::default(), Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert_eq!(session.path(), "/dev/ttyACM1");
        assert_eq!(session.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_first_device_none_found() {
        let mut host = MockHost::new();
        let session =
            first_device(&mut host, &DeviceFilter::default(), Duration::from_secs(1)).unwrap();
        assert!(session.is_none());
    }
}
