use super::TSocket;
use crate::icmp::v4::Ttl;
use socket2::{Domain, Protocol, SockAddr, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::{io, time::Duration};

/// Raw ICMPv4 socket. The kernel adds the IPv4 header on send and hands it
/// back on receive. Creating one usually requires elevated privileges.
pub(crate) struct RawSocket {
    socket: socket2::Socket,
}

impl RawSocket {
    /// Opens the socket, binds it to the wildcard address and applies `ttl`.
    /// Receives give up after `poll_interval` so the caller can check for
    /// cancellation.
    pub(crate) fn new(ttl: Ttl, poll_interval: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating RawSocket");
        let socket = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        let wildcard: SockAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into();
        socket.bind(&wildcard)?;
        socket.set_ttl(u32::from(u8::from(ttl)))?;
        socket.set_read_timeout(Some(poll_interval))?;
        Ok(RawSocket { socket })
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
        // to `&mut [std::mem::MaybeUninit<u8>]`: it never writes uninitialized bytes into the
        // buffer.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        //
        // On a RAW socket we get an IP packet.
        let (n, socket_addr) = self.socket.recv_from(unsafe {
            &mut *(std::ptr::addr_of_mut!(*buf) as *mut [std::mem::MaybeUninit<u8>])
        })?;
        let source = socket_addr
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "received from a non-IP address"))?
            .ip();
        Ok((n, source))
    }
}
