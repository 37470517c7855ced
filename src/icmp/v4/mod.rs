mod checksum;
pub(crate) mod echo_session;
mod icmp_header;
mod ipv4_header;
mod sequence_number;
pub(crate) mod socket;
mod ttl;

pub(crate) use echo_session::{EchoOutcome, IcmpEchoSession};
pub(crate) use sequence_number::SequenceNumber;
pub(crate) use socket::TSocket;
pub use ttl::Ttl;
