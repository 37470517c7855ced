use std::io;
use std::net::IpAddr;

pub(crate) mod raw_socket;

/// Send/receive seam of the echo session. `recv_from` hands back the datagram as
/// read from a raw IPv4 socket, i.e. IPv4 header followed by the ICMP message,
/// and must return `WouldBlock` or `TimedOut` when nothing arrived within the
/// socket's poll interval.
pub(crate) trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}

/// Receive errors after which the receive loop simply tries again: the poll
/// interval elapsed, or a signal interrupted the call.
pub(crate) fn is_retryable(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted)
}
