use super::{ProbeStatus, ProbeStrategy};
use crate::Endpoint;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::time::{Duration, Instant};

const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Probes an endpoint with a TCP connect bounded by a timeout. Failed connects
/// are not retried.
#[derive(Clone, Debug)]
pub struct TcpConnectProbe {
    timeout: Duration,
    last_round_trip: Option<Duration>,
}

impl TcpConnectProbe {
    pub fn new(timeout: Duration) -> Self {
        TcpConnectProbe { timeout: timeout.max(MIN_CONNECT_TIMEOUT), last_round_trip: None }
    }
}

impl ProbeStrategy for TcpConnectProbe {
    fn test(&mut self, endpoint: &Endpoint) -> ProbeStatus {
        let addr = endpoint.socket_addr();
        // The socket is closed when it goes out of scope, connected or not.
        let socket = match Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)) {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!("could not create TCP socket for {}: {}", endpoint, e);
                return ProbeStatus::Error;
            }
        };
        let started = Instant::now();
        match socket.connect_timeout(&addr.into(), self.timeout) {
            Ok(()) => {
                let round_trip = started.elapsed();
                tracing::trace!("{} accepted the connection in {:?}", endpoint, round_trip);
                self.last_round_trip = Some(round_trip);
                ProbeStatus::Success
            }
            Err(e) => {
                let status = classify_connect_error(&e);
                tracing::trace!("connect to {} failed ({}): {}", endpoint, status, e);
                status
            }
        }
    }

    fn last_round_trip(&self) -> Option<Duration> {
        self.last_round_trip
    }
}

/// Refusals, resets, unreachable routes and timeouts say something about the
/// target; everything else is a local fault.
fn classify_connect_error(error: &io::Error) -> ProbeStatus {
    match error.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable => ProbeStatus::Failure,
        _ => ProbeStatus::Error,
    }
}
