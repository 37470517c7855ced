use super::{ProbeStatus, ProbeStrategy};
use crate::icmp::v4::{EchoOutcome, IcmpEchoSession, TSocket};
use crate::Endpoint;
use std::net::IpAddr;
use std::time::Duration;

/// ICMP echo probe. Owns one session for the lifetime of a worker; the session
/// is closed when the probe is dropped.
pub(crate) struct IcmpEchoProbe<S> {
    session: IcmpEchoSession<S>,
}

impl<S> IcmpEchoProbe<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(session: IcmpEchoSession<S>) -> Self {
        IcmpEchoProbe { session }
    }
}

impl<S> ProbeStrategy for IcmpEchoProbe<S>
where
    S: TSocket + 'static,
{
    fn test(&mut self, endpoint: &Endpoint) -> ProbeStatus {
        let IpAddr::V4(destination) = endpoint.ip() else {
            tracing::error!("ICMP probing supports IPv4 only, skipping {}", endpoint);
            return ProbeStatus::Error;
        };
        match self.session.probe(destination) {
            Ok(EchoOutcome::Reply(round_trip)) => {
                tracing::trace!("{} answered in {:?}", destination, round_trip);
                ProbeStatus::Success
            }
            Ok(EchoOutcome::NoReply) => ProbeStatus::Failure,
            Err(e) => {
                tracing::error!("ICMP session {:#06x} failed on {}: {}", self.session.identifier(), destination, e);
                ProbeStatus::Error
            }
        }
    }

    fn last_round_trip(&self) -> Option<Duration> {
        self.session.last_round_trip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::v4::socket::tests::{OnReceive, OnSend, SocketMock};
    use crate::scan_config::IcmpConfig;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    fn probe(socket: SocketMock) -> IcmpEchoProbe<SocketMock> {
        IcmpEchoProbe::new(IcmpEchoSession::new(socket, Duration::from_millis(40), &IcmpConfig::default()))
    }

    fn endpoint() -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 0)
    }

    #[test]
    fn reply_is_success() {
        let mut probe = probe(SocketMock::new_default());
        assert_eq!(None, probe.last_round_trip());
        assert_eq!(ProbeStatus::Success, probe.test(&endpoint()));
        assert!(probe.last_round_trip().is_some());
    }

    #[test]
    fn silence_is_failure() {
        let socket = SocketMock::new(OnSend::ReturnDefault, OnReceive::ReturnWouldBlock);
        let mut probe = probe(socket.clone());
        assert_eq!(ProbeStatus::Failure, probe.test(&endpoint()));
        socket.should_send_number_of_messages(4);
    }

    #[test]
    fn send_error_is_error() {
        let mut probe = probe(SocketMock::new(OnSend::ReturnErr, OnReceive::ReturnWouldBlock));
        assert_eq!(ProbeStatus::Error, probe.test(&endpoint()));
    }

    #[test]
    fn ipv6_endpoint_is_error() {
        let socket = SocketMock::new_default();
        let mut probe = probe(socket.clone());
        let endpoint = Endpoint::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 0);
        assert_eq!(ProbeStatus::Error, probe.test(&endpoint));
        socket.should_send_number_of_messages(0);
    }
}
