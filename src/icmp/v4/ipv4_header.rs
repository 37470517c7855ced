use super::Ttl;
use crate::scan_error::{ScanError, ScanResult};
use std::net::Ipv4Addr;

pub(crate) const PROTOCOL_ICMP: u8 = 1;

/// IPv4 header without options. Multi-byte fields are host order here; `encode`
/// and `decode` do the conversion to and from network order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Ipv4Header {
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_and_fragment_offset: u16,
    pub ttl: Ttl,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    pub(crate) const MIN_LEN: usize = 20;
    pub(crate) const MAX_LEN: usize = 60;
    const VERSION: u8 = 4;
    /// Header length in 32-bit words when there are no options.
    #[cfg(test)]
    const IHL_NO_OPTIONS: u8 = 5;

    /// Header for an ICMP datagram carrying `payload_len` bytes.
    #[cfg(test)]
    pub(crate) fn icmp(source: Ipv4Addr, destination: Ipv4Addr, ttl: Ttl, payload_len: usize) -> Self {
        Ipv4Header {
            type_of_service: 0,
            total_length: u16::try_from(Self::MIN_LEN + payload_len).unwrap_or(u16::MAX),
            identification: 0,
            flags_and_fragment_offset: 0,
            ttl,
            protocol: PROTOCOL_ICMP,
            source,
            destination,
        }
    }

    /// Encodes the header (no options) and computes its checksum, which covers
    /// the header bytes only. The kernel writes this header for raw ICMP
    /// sockets, so only replies fabricated in tests need it.
    #[cfg(test)]
    pub(crate) fn encode(&self) -> [u8; Self::MIN_LEN] {
        let mut buf = [0u8; Self::MIN_LEN];
        buf[0] = (Self::VERSION << 4) | Self::IHL_NO_OPTIONS;
        buf[1] = self.type_of_service;
        buf[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        buf[4..6].copy_from_slice(&self.identification.to_be_bytes());
        buf[6..8].copy_from_slice(&self.flags_and_fragment_offset.to_be_bytes());
        buf[8] = self.ttl.into();
        buf[9] = self.protocol;
        buf[12..16].copy_from_slice(&self.source.octets());
        buf[16..20].copy_from_slice(&self.destination.octets());
        super::checksum::fill_checksum(&mut buf, 10);
        buf
    }

    /// Decodes a header from the start of `buf` and returns it together with the
    /// number of bytes it occupies (options included).
    pub(crate) fn decode(buf: &[u8]) -> ScanResult<(Ipv4Header, usize)> {
        if buf.len() < Self::MIN_LEN {
            return Err(ScanError::malformed(format!("IPv4 header needs {} bytes, got {}", Self::MIN_LEN, buf.len())));
        }
        let version = buf[0] >> 4;
        if version != Self::VERSION {
            return Err(ScanError::malformed(format!("unexpected IP version {version}")));
        }
        let header_len = usize::from(buf[0] & 0x0F) * 4;
        if header_len < Self::MIN_LEN || header_len > buf.len() {
            return Err(ScanError::malformed(format!("invalid IPv4 header length {header_len}")));
        }
        let header = Ipv4Header {
            type_of_service: buf[1],
            total_length: u16::from_be_bytes([buf[2], buf[3]]),
            identification: u16::from_be_bytes([buf[4], buf[5]]),
            flags_and_fragment_offset: u16::from_be_bytes([buf[6], buf[7]]),
            ttl: Ttl(buf[8]),
            protocol: buf[9],
            source: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            destination: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        };
        Ok((header, header_len))
    }
}

/// Prepends an IPv4 header to an already encoded ICMP message.
#[cfg(test)]
pub(crate) fn build_ipv4_packet(header: &Ipv4Header, icmp: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(Ipv4Header::MIN_LEN + icmp.len());
    packet.extend_from_slice(&header.encode());
    packet.extend_from_slice(icmp);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::v4::checksum;
    use pnet_packet::ipv4::Ipv4Packet;

    fn sample() -> Ipv4Header {
        Ipv4Header::icmp(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(192, 168, 1, 20), Ttl(64), 16)
    }

    #[test]
    fn encode_writes_network_order() {
        let bytes = sample().encode();
        assert_eq!(0x45, bytes[0]);
        assert_eq!([0x00, 36], [bytes[2], bytes[3]]);
        assert_eq!(64, bytes[8]);
        assert_eq!(PROTOCOL_ICMP, bytes[9]);
        assert_eq!([10u8, 0, 0, 1], bytes[12..16]);
        assert_eq!([192u8, 168, 1, 20], bytes[16..20]);
    }

    #[test]
    fn header_checksum_covers_header_only() {
        let bytes = sample().encode();
        assert!(checksum::is_valid(&bytes));
        let packet = build_ipv4_packet(&sample(), &[8, 0, 0xAA, 0xBB]);
        assert!(checksum::is_valid(&packet[..Ipv4Header::MIN_LEN]));
    }

    #[test]
    fn encoded_header_is_readable_by_pnet() {
        let bytes = sample().encode();
        let packet = Ipv4Packet::new(&bytes).unwrap();
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!(Ipv4Addr::new(10, 0, 0, 1), packet.get_source());
        assert_eq!(pnet_packet::ipv4::checksum(&packet), packet.get_checksum());
    }

    #[test]
    fn decode_reports_consumed_length_with_options() {
        let mut bytes = vec![0u8; 24];
        bytes[..20].copy_from_slice(&sample().encode());
        bytes[0] = 0x46;
        let (header, consumed) = Ipv4Header::decode(&bytes).unwrap();
        assert_eq!(24, consumed);
        assert_eq!(Ipv4Addr::new(192, 168, 1, 20), header.destination);
        assert_eq!(Ttl(64), header.ttl);
    }

    #[test]
    fn decode_reverses_encode() {
        let (header, consumed) = Ipv4Header::decode(&sample().encode()).unwrap();
        assert_eq!(sample(), header);
        assert_eq!(Ipv4Header::MIN_LEN, consumed);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(Ipv4Header::decode(&[0x45, 0, 0]).is_err());
    }

    #[test]
    fn decode_rejects_other_versions() {
        let mut bytes = sample().encode();
        bytes[0] = 0x65;
        assert!(Ipv4Header::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_header_length_beyond_buffer() {
        let mut bytes = sample().encode();
        bytes[0] = 0x4F;
        assert!(Ipv4Header::decode(&bytes).is_err());
    }
}
