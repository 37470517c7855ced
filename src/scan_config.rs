use crate::icmp::v4::Ttl;
use crate::Endpoint;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Protocol {
    /// TCP connect against the endpoint's port.
    #[default]
    Tcp,
    /// ICMP echo against the endpoint's address; the port is ignored.
    Icmp,
}

/// Knobs of the ICMP echo probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IcmpConfig {
    pub ttl: Ttl,
    pub payload_len: usize,
    pub payload_fill: u8,
    /// Echo requests sent per endpoint before giving up. Each attempt waits
    /// `timeout / attempts` for the reply.
    pub attempts: u32,
    /// How long closing a session waits for its receive thread.
    pub drain_timeout: Duration,
    /// How often the receive thread checks whether the session is closing.
    pub poll_interval: Duration,
}

impl Default for IcmpConfig {
    fn default() -> Self {
        IcmpConfig {
            ttl: Ttl::default(),
            payload_len: 8,
            payload_fill: b'e',
            attempts: 4,
            drain_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What a probe strategy needs to know to be created.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub icmp: IcmpConfig,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanConfig {
    pub endpoints: Vec<Endpoint>,
    pub thread_count: usize,
    pub timeout: Duration,
    pub protocol: Protocol,
    pub icmp: IcmpConfig,
}

impl ScanConfig {
    pub(crate) fn probe_config(&self) -> ProbeConfig {
        ProbeConfig { timeout: self.timeout, icmp: self.icmp.clone() }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            endpoints: vec![],
            thread_count: 10,
            timeout: Duration::from_secs(20),
            protocol: Protocol::Tcp,
            icmp: IcmpConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ScanConfig::default();
        assert_eq!(Protocol::Tcp, config.protocol);
        assert_eq!(10, config.thread_count);
        assert_eq!(Duration::from_secs(20), config.timeout);
        assert_eq!(4, config.icmp.attempts);
        assert_eq!(Ttl(64), config.icmp.ttl);
    }

    #[test]
    fn probe_config_carries_timeout_and_icmp_settings() {
        let config = ScanConfig { timeout: Duration::from_millis(750), ..ScanConfig::default() };
        let probe_config = config.probe_config();
        assert_eq!(Duration::from_millis(750), probe_config.timeout);
        assert_eq!(config.icmp, probe_config.icmp);
    }
}
