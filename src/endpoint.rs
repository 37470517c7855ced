use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Address and port of one scan target. The port is ignored by ICMP probes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Endpoint(SocketAddr::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl FromStr for Endpoint {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(Endpoint)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn accessors() {
        let endpoint = Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 80);
        assert_eq!(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), endpoint.ip());
        assert_eq!(80, endpoint.port());
    }

    #[test]
    fn parse_and_display() {
        let endpoint: Endpoint = "10.0.0.2:8080".parse().unwrap();
        assert_eq!("10.0.0.2:8080", endpoint.to_string());
        assert!("10.0.0.2".parse::<Endpoint>().is_err());
    }
}
