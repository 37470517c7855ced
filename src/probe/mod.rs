use crate::icmp::v4::IcmpEchoSession;
use crate::scan_config::{ProbeConfig, Protocol};
use crate::scan_error::ScanResult;
use crate::Endpoint;
use std::fmt;
use std::time::Duration;

pub(crate) mod icmp;
pub(crate) mod tcp;

pub use tcp::TcpConnectProbe;

/// Classification of one probe.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ProbeStatus {
    /// The endpoint is reachable.
    Success,
    /// The endpoint refused, or did not answer within the timeout.
    Failure,
    /// A local fault unrelated to the endpoint, e.g. socket creation failed.
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProbeStatus::Success => "success",
            ProbeStatus::Failure => "failure",
            ProbeStatus::Error => "error",
        };
        write!(f, "{text}")
    }
}

/// One reachability test against one endpoint. Each worker owns its own
/// strategy, so implementations need not be `Sync`.
pub trait ProbeStrategy: Send {
    fn test(&mut self, endpoint: &Endpoint) -> ProbeStatus;

    /// Round-trip time of the last successful `test`, if the strategy measures one.
    fn last_round_trip(&self) -> Option<Duration> {
        None
    }
}

/// Creates one strategy per worker. An `Err` means the protocol cannot be used
/// at all and aborts the run before any probe starts.
pub trait ProbeFactory: Send + Sync {
    fn create(&self, protocol: Protocol, config: &ProbeConfig) -> ScanResult<Box<dyn ProbeStrategy>>;
}

/// Factory backed by real sockets.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProbeFactory;

impl ProbeFactory for SystemProbeFactory {
    fn create(&self, protocol: Protocol, config: &ProbeConfig) -> ScanResult<Box<dyn ProbeStrategy>> {
        match protocol {
            Protocol::Tcp => Ok(Box::new(TcpConnectProbe::new(config.timeout))),
            Protocol::Icmp => {
                let session = IcmpEchoSession::initialize(config.timeout, &config.icmp)?;
                Ok(Box::new(icmp::IcmpEchoProbe::new(session)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_config::IcmpConfig;
    use std::time::Duration;

    #[test]
    fn display() {
        assert_eq!("success", ProbeStatus::Success.to_string());
        assert_eq!("failure", ProbeStatus::Failure.to_string());
        assert_eq!("error", ProbeStatus::Error.to_string());
    }

    #[test]
    fn system_factory_creates_tcp_probe() {
        let config = ProbeConfig { timeout: Duration::from_millis(100), icmp: IcmpConfig::default() };
        assert!(SystemProbeFactory.create(Protocol::Tcp, &config).is_ok());
    }
}
