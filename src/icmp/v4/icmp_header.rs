use super::checksum;
use super::SequenceNumber;
use crate::scan_error::{ScanError, ScanResult};

pub(crate) const ECHO_REPLY_TYPE: u8 = 0;
pub(crate) const ECHO_REPLY_CODE: u8 = 0;
pub(crate) const ECHO_REQUEST_TYPE: u8 = 8;
pub(crate) const ECHO_REQUEST_CODE: u8 = 0;

/// ICMP echo header. The checksum is not a field: `encode` always computes it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
}

impl IcmpHeader {
    pub(crate) const LEN: usize = 8;
    const CHECKSUM_OFFSET: usize = 2;

    pub(crate) fn echo_request(identifier: u16, sequence: SequenceNumber) -> Self {
        IcmpHeader { icmp_type: ECHO_REQUEST_TYPE, code: ECHO_REQUEST_CODE, identifier, sequence: sequence.into() }
    }

    pub(crate) fn is_echo_reply(&self) -> bool {
        self.icmp_type == ECHO_REPLY_TYPE && self.code == ECHO_REPLY_CODE
    }

    /// Encodes header and payload into one message, checksum over both.
    pub(crate) fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN + payload.len()];
        buf[0] = self.icmp_type;
        buf[1] = self.code;
        buf[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        buf[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        buf[Self::LEN..].copy_from_slice(payload);
        checksum::fill_checksum(&mut buf, Self::CHECKSUM_OFFSET);
        buf
    }

    /// Decodes the header at the start of `buf`; returns it with the number of
    /// bytes consumed. The checksum is not verified since raw receives may be
    /// truncated to the receive buffer.
    pub(crate) fn decode(buf: &[u8]) -> ScanResult<(IcmpHeader, usize)> {
        if buf.len() < Self::LEN {
            return Err(ScanError::malformed(format!("ICMP header needs {} bytes, got {}", Self::LEN, buf.len())));
        }
        let header = IcmpHeader {
            icmp_type: buf[0],
            code: buf[1],
            identifier: u16::from_be_bytes([buf[4], buf[5]]),
            sequence: u16::from_be_bytes([buf[6], buf[7]]),
        };
        Ok((header, Self::LEN))
    }
}

/// Builds an echo request: header plus payload, checksum filled in.
pub(crate) fn build_echo_request(identifier: u16, sequence: SequenceNumber, payload: &[u8]) -> Vec<u8> {
    IcmpHeader::echo_request(identifier, sequence).encode(payload)
}
