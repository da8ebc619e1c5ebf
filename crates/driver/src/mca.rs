//! MCA commands on top of a session

use crate::error::Result;
use crate::session::DeviceSession;
use crate::transport::Transport;
use protocol::{Command, Reply, RequestType};
use tracing::{debug, warn};

impl<T: Transport> DeviceSession<T> {
    /// Open the session and resolve its bulk endpoints
    ///
    /// The session is closed again if endpoint discovery fails.
    pub fn connect(&mut self) -> Result<()> {
        self.open()?;
        if let Err(e) = self.discover_endpoints() {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Send a query without waiting for the reply
    pub fn send_request(&mut self, request: RequestType) -> Result<()> {
        debug!("{}: request type {}", self.identifier(), request);
        self.send(&Command::query(request).encode())
    }

    /// Read and decode the reply to a query sent with [`send_request`]
    ///
    /// [`send_request`]: DeviceSession::send_request
    pub fn receive_reply(&mut self, request: RequestType) -> Result<Reply> {
        let raw = self.receive(request.reply_len())?;
        Ok(Reply::decode(request, &raw)?)
    }

    /// Query the spectrum and/or packet zero
    pub fn request(&mut self, request: RequestType) -> Result<Reply> {
        self.send_request(request)?;
        self.receive_reply(request)
    }

    /// Clear the accumulated spectrum
    ///
    /// Returns whether the device echoed the command back unchanged.
    pub fn zero_spectrum(&mut self) -> Result<bool> {
        let command = Command::zero();
        let echo = self.transact(&command.encode(), command.reply_len())?;
        let acknowledged = echo == command.encode();
        if !acknowledged {
            warn!(
                "{}: zero command echoed as {:?}",
                self.identifier(),
                echo
            );
        }
        Ok(acknowledged)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DriverError;
    use crate::session::{DeviceSession, SessionState};
    use crate::test_utils::MockTransport;
    use crate::transport::{DeviceLocation, EndpointInfo};
    use protocol::{RequestType, SpectrumSize};

    fn session(transport: MockTransport) -> DeviceSession<MockTransport> {
        DeviceSession::new(DeviceLocation::new("1-4", "1-4"), transport)
    }

    #[test]
    fn test_connect_closes_on_discovery_failure() {
        let transport = MockTransport::new().with_endpoints(vec![EndpointInfo::bulk(0x81, 64)]);
        let log = transport.log();
        let mut session = session(transport);

        assert!(matches!(
            session.connect(),
            Err(DriverError::EndpointDiscovery(_))
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log.close_calls(), 1);
    }

    #[test]
    fn test_request_writes_query_command() {
        let transport = MockTransport::new().with_counts(vec![1; 512]);
        let log = transport.log();
        let mut session = session(transport);
        session.connect().unwrap();

        let request = RequestType::spectrum(SpectrumSize::Channels512, false);
        let reply = session.request(request).unwrap();
        assert_eq!(log.writes(), vec![vec![0, 2]]);
        assert_eq!(reply.spectrum.unwrap().total(), 512);
        assert!(reply.packet_zero.is_none());
    }

    #[test]
    fn test_zero_spectrum_acknowledged() {
        let transport = MockTransport::new().with_counts(vec![7; 512]);
        let mut session = session(transport);
        session.connect().unwrap();

        assert!(session.zero_spectrum().unwrap());
        let reply = session
            .request(RequestType::spectrum(SpectrumSize::Channels512, false))
            .unwrap();
        assert_eq!(reply.spectrum.unwrap().total(), 0);
    }

    #[test]
    fn test_zero_spectrum_bad_echo() {
        let transport = MockTransport::new().with_zero_echo([1, 0]);
        let mut session = session(transport);
        session.connect().unwrap();

        assert!(!session.zero_spectrum().unwrap());
    }
}
