use super::icmp_header::{build_echo_request, IcmpHeader};
use super::ipv4_header::{Ipv4Header, PROTOCOL_ICMP};
use super::checksum;
use super::socket::{is_retryable, raw_socket::RawSocket, TSocket};
use super::{SequenceNumber, Ttl};
use crate::scan_config::IcmpConfig;
use crate::scan_error::{ScanError, ScanErrorKind, ScanResult};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const MIN_ATTEMPT_WAIT: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    SocketReady,
    PacketBuilt,
    Probing,
    Closed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum EchoOutcome {
    /// A matching echo reply arrived; carries the round-trip time.
    Reply(Duration),
    /// Every attempt timed out.
    NoReply,
}

pub(crate) struct EchoRequest {
    pub destination: Ipv4Addr,
    pub sequence_number: SequenceNumber,
    pub packet: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct EchoReply {
    pub source: IpAddr,
    pub sequence_number: SequenceNumber,
    pub ttl: Ttl,
    pub receive_time: Instant,
}

enum ReceiveEvent {
    Reply(EchoReply),
    Failed(io::Error),
}

/// One raw socket, one identifier, one probe in flight at a time.
///
/// Replies are read by a dedicated receive thread which is started before the
/// first request goes out. It forwards every echo reply carrying this session's
/// identifier; the probing side accepts it only when it comes from the probed
/// address.
pub(crate) struct IcmpEchoSession<S> {
    state: State,
    socket: Option<Arc<S>>,
    identifier: u16,
    next_sequence_number: SequenceNumber,
    payload: Vec<u8>,
    attempt_wait: Duration,
    config: IcmpConfig,
    receive_loop: Option<ReceiveLoop>,
    last_round_trip: Option<Duration>,
}

impl IcmpEchoSession<RawSocket> {
    /// Opens the raw socket. Any failure here means ICMP probing is not possible
    /// at all on this host.
    pub(crate) fn initialize(timeout: Duration, config: &IcmpConfig) -> ScanResult<Self> {
        let socket = RawSocket::new(config.ttl, config.poll_interval).map_err(|e| {
            tracing::error!("could not set up raw ICMP socket: {}", e);
            ScanError::probe_unavailable(&e)
        })?;
        Ok(Self::new(socket, timeout, config))
    }
}

impl<S> IcmpEchoSession<S> {
    pub(crate) fn identifier(&self) -> u16 {
        self.identifier
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn last_round_trip(&self) -> Option<Duration> {
        self.last_round_trip
    }

    /// Stops the receive thread, waits up to `drain_timeout` for its pending
    /// receive to finish and releases the socket. Safe to call more than once
    /// and before any probe ran.
    pub(crate) fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        if let Some(receive_loop) = self.receive_loop.take() {
            receive_loop.stop(self.config.drain_timeout);
        }
        self.socket = None;
        self.state = State::Closed;
        tracing::debug!("ICMP session {:#06x} closed", self.identifier);
    }
}

impl<S> IcmpEchoSession<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(socket: S, timeout: Duration, config: &IcmpConfig) -> Self {
        let attempts = config.attempts.max(1);
        let attempt_wait = (timeout / attempts).max(MIN_ATTEMPT_WAIT);
        let identifier = next_identifier();
        tracing::debug!("ICMP session {:#06x} ready, {} attempt(s) of {:?}", identifier, attempts, attempt_wait);
        IcmpEchoSession {
            state: State::SocketReady,
            socket: Some(Arc::new(socket)),
            identifier,
            next_sequence_number: SequenceNumber::start_value(),
            payload: vec![config.payload_fill; config.payload_len],
            attempt_wait,
            config: config.clone(),
            receive_loop: None,
            last_round_trip: None,
        }
    }

    /// Builds the next echo request. The sequence number, and with it the
    /// checksum, changes on every call.
    pub(crate) fn build_packet(&mut self, destination: Ipv4Addr) -> EchoRequest {
        let sequence_number = self.next_sequence_number;
        self.next_sequence_number = sequence_number.next();
        self.state = State::PacketBuilt;
        EchoRequest {
            destination,
            sequence_number,
            packet: build_echo_request(self.identifier, sequence_number, &self.payload),
        }
    }

    /// Sends up to `attempts` echo requests to `destination`, waiting
    /// `timeout / attempts` for a reply after each one.
    pub(crate) fn probe(&mut self, destination: Ipv4Addr) -> ScanResult<EchoOutcome> {
        let socket = self
            .socket
            .clone()
            .ok_or_else(|| ScanError::new(ScanErrorKind::Io, "ICMP session is closed"))?;
        self.ensure_receiving(&socket)?;
        self.discard_stale_events();

        let addr: socket2::SockAddr = SocketAddr::new(IpAddr::V4(destination), 0).into();
        let mut send_times = HashMap::<SequenceNumber, Instant>::new();
        for attempt in 1..=self.config.attempts.max(1) {
            let request = self.build_packet(destination);
            let send_time = Instant::now();
            socket.send_to(&request.packet, &addr)?;
            self.state = State::Probing;
            send_times.insert(request.sequence_number, send_time);
            tracing::trace!(
                "echo request {:#06x}/{} sent to {}",
                self.identifier,
                u16::from(request.sequence_number),
                request.destination
            );

            if let Some(reply) = self.wait_for_reply(destination, send_time + self.attempt_wait)? {
                let sent_at = send_times.get(&reply.sequence_number).copied().unwrap_or(send_time);
                let round_trip = reply.receive_time.saturating_duration_since(sent_at);
                tracing::trace!("echo reply from {} ttl={} time={:?}", reply.source, reply.ttl, round_trip);
                self.last_round_trip = Some(round_trip);
                return Ok(EchoOutcome::Reply(round_trip));
            }
            tracing::debug!("attempt {} to {} timed out", attempt, destination);
        }
        Ok(EchoOutcome::NoReply)
    }

    fn ensure_receiving(&mut self, socket: &Arc<S>) -> ScanResult<()> {
        if self.receive_loop.is_none() {
            let buffer_len = Ipv4Header::MAX_LEN + IcmpHeader::LEN + self.payload.len();
            self.receive_loop = Some(ReceiveLoop::start(socket.clone(), self.identifier, buffer_len)?);
        }
        Ok(())
    }

    fn discard_stale_events(&self) {
        if let Some(receive_loop) = &self.receive_loop {
            while let Ok(event) = receive_loop.event_rx.try_recv() {
                if let ReceiveEvent::Reply(reply) = event {
                    tracing::trace!("discarding late reply from {}", reply.source);
                }
            }
        }
    }

    fn wait_for_reply(&self, destination: Ipv4Addr, deadline: Instant) -> ScanResult<Option<EchoReply>> {
        let receive_loop = self
            .receive_loop
            .as_ref()
            .ok_or_else(|| ScanError::new(ScanErrorKind::Io, "receive loop not running"))?;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            match receive_loop.event_rx.recv_timeout(deadline - now) {
                Ok(ReceiveEvent::Reply(reply)) if reply.source == IpAddr::V4(destination) => return Ok(Some(reply)),
                Ok(ReceiveEvent::Reply(reply)) => {
                    tracing::trace!("ignoring reply from {} while probing {}", reply.source, destination);
                }
                Ok(ReceiveEvent::Failed(e)) => return Err(e.into()),
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(ScanError::new(ScanErrorKind::Io, "receive loop stopped"));
                }
            }
        }
    }
}

impl<S> Drop for IcmpEchoSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

struct ReceiveLoop {
    closing: Arc<AtomicBool>,
    event_rx: mpsc::Receiver<ReceiveEvent>,
    /// Signalled by the receive thread right before it exits.
    exited_rx: mpsc::Receiver<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReceiveLoop {
    fn start<S>(socket: Arc<S>, identifier: u16, buffer_len: usize) -> ScanResult<Self>
    where
        S: TSocket + 'static,
    {
        let closing = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel::<ReceiveEvent>();
        let (exited_tx, exited_rx) = mpsc::channel::<()>();

        let thread_closing = closing.clone();
        let thread_handle = std::thread::Builder::new()
            .name(format!("icmp-recv-{identifier:04x}"))
            .spawn(move || {
                let mut buf = vec![0u8; buffer_len];
                while !thread_closing.load(Ordering::Acquire) {
                    let event = match socket.recv_from(&mut buf) {
                        Err(e) if is_retryable(&e) => continue,
                        Err(e) if thread_closing.load(Ordering::Acquire) => {
                            tracing::trace!("receive ended while closing: {}", e);
                            break;
                        }
                        Err(e) => {
                            tracing::error!("error receiving ICMP: {}", e);
                            ReceiveEvent::Failed(e)
                        }
                        Ok((n, source)) => match decode_echo_reply(&buf[..n], identifier) {
                            Ok(Some((ip_header, icmp_header))) => ReceiveEvent::Reply(EchoReply {
                                source,
                                sequence_number: icmp_header.sequence.into(),
                                ttl: ip_header.ttl,
                                receive_time: Instant::now(),
                            }),
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::warn!("dropping undecodable datagram from {}: {}", source, e);
                                continue;
                            }
                        },
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                drop(socket);
                let _ = exited_tx.send(());
                tracing::trace!("receive loop {:#06x} ended", identifier);
            })?;

        Ok(ReceiveLoop { closing, event_rx, exited_rx, thread_handle: Some(thread_handle) })
    }

    /// Waits up to `drain_timeout` for the receive in progress to return and the
    /// thread to exit. A thread that overstays is left detached.
    fn stop(mut self, drain_timeout: Duration) {
        self.closing.store(true, Ordering::Release);
        match self.exited_rx.recv_timeout(drain_timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.thread_handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("receive thread panicked");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("receive loop did not drain within {:?}", drain_timeout);
            }
        }
    }
}

/// Decodes a datagram read from a raw socket (IPv4 header + ICMP message).
/// Returns the headers only when it is an echo reply carrying `identifier`.
/// A matching reply that arrived complete must also carry a valid checksum.
pub(crate) fn decode_echo_reply(datagram: &[u8], identifier: u16) -> ScanResult<Option<(Ipv4Header, IcmpHeader)>> {
    let (ip_header, offset) = Ipv4Header::decode(datagram)?;
    if ip_header.protocol != PROTOCOL_ICMP {
        return Ok(None);
    }
    let (icmp_header, _) = IcmpHeader::decode(&datagram[offset..])?;
    if !icmp_header.is_echo_reply() || icmp_header.identifier != identifier {
        return Ok(None);
    }
    let total_length = usize::from(ip_header.total_length);
    if total_length > offset && total_length <= datagram.len() && !checksum::is_valid(&datagram[offset..total_length]) {
        return Err(ScanError::malformed(format!("bad ICMP checksum in echo reply {identifier:#06x}")));
    }
    Ok(Some((ip_header, icmp_header)))
}

fn next_identifier() -> u16 {
    static NEXT_IDENTIFIER: OnceLock<AtomicU16> = OnceLock::new();
    NEXT_IDENTIFIER
        .get_or_init(|| AtomicU16::new(rand::random()))
        .fetch_add(1, Ordering::Relaxed)
}
