//! One raw ICMP socket per probe attempt: open, send one Echo Request,
//! wait under a deadline for the reply that answers it.

use crate::classify::{self, ReplyKind};
use crate::packet::{self, IcmpHeader};
use crate::ping::PingError;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

/// Receive buffer size; replies of interest fit well under this.
const RECV_BUFFER_LEN: usize = 1024;

/// A matched, parsed reply as the schedulers consume it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub responder: Ipv4Addr,
    pub kind: ReplyKind,
    pub header: IcmpHeader,
    /// Arrival timestamp, for wall-clock round trips.
    pub received_at: Instant,
    /// Arrival time in seconds since the epoch, comparable with the
    /// echoed send timestamp.
    pub received_unix: f64,
    /// The send time an Echo Reply carries in its payload.
    pub echoed_timestamp: Option<f64>,
}

/// Exclusive owner of one raw ICMP socket. Dropping it closes the socket,
/// so every exit path of an attempt releases the resource.
pub struct EchoSocket {
    socket: Socket,
}

impl EchoSocket {
    pub fn open() -> Result<Self, PingError> {
        let socket =
            Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(|e| {
                match e.kind() {
                    io::ErrorKind::PermissionDenied => PingError::PermissionDenied,
                    kind => PingError::SocketError(kind),
                }
            })?;
        Ok(Self { socket })
    }

    /// Opens the socket with the outgoing TTL pinned, for hop-by-hop
    /// probing.
    pub fn open_with_ttl(ttl: u8) -> Result<Self, PingError> {
        let this = Self::open()?;
        this.socket
            .set_ttl(u32::from(ttl))
            .map_err(|e| PingError::SocketError(e.kind()))?;
        Ok(this)
    }

    /// Builds and transmits one Echo Request, returning the send
    /// timestamp. Raw ICMP has no ports; the sockaddr carries a zero.
    pub fn send_echo(
        &self,
        dest: Ipv4Addr,
        identifier: u16,
        sequence: u16,
    ) -> Result<Instant, PingError> {
        let request = packet::build_echo_request(identifier, sequence);
        let addr = SockAddr::from(SocketAddr::new(IpAddr::V4(dest), 0));
        self.socket
            .send_to(&request, &addr)
            .map_err(|e| PingError::FailedToSendPacket(e.kind()))?;
        Ok(Instant::now())
    }

    /// Waits for a reply attributable to `identifier` (and, when given,
    /// `sequence_filter`), under a hard wall-clock deadline.
    ///
    /// The remaining budget is recomputed before every blocking read and
    /// used as that read's timeout, so foreign or unparseable datagrams
    /// consume budget but never reset it. Runs out of budget: `Timeout`.
    pub fn recv_matching(
        &self,
        identifier: u16,
        sequence_filter: Option<u16>,
        timeout: Duration,
    ) -> Result<Reply, PingError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PingError::Timeout);
            }
            // SO_RCVTIMEO truncates to the platform tick; keep a floor so
            // a nearly-spent budget cannot turn into an unbounded block.
            let wait = remaining.max(Duration::from_millis(1));
            self.socket
                .set_read_timeout(Some(wait))
                .map_err(|e| PingError::SocketError(e.kind()))?;

            let mut buf = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_LEN];
            let (len, addr) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                        return Err(PingError::Timeout)
                    }
                    io::ErrorKind::Interrupted => continue,
                    kind => return Err(PingError::SocketError(kind)),
                },
            };
            let received_at = Instant::now();
            let received_unix = packet::unix_now();

            // recv_from initialized the first `len` bytes.
            let datagram =
                unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };
            let (header, payload_offset) = match packet::parse_icmp_header(datagram) {
                Ok(parsed) => parsed,
                // Too short to attribute to anything; keep waiting.
                Err(_) => continue,
            };
            match classify::echoed_identity(datagram, &header, payload_offset) {
                Some((id, seq))
                    if id == identifier && sequence_filter.map_or(true, |s| s == seq) =>
                {
                    let responder = addr
                        .as_socket_ipv4()
                        .map(|a| *a.ip())
                        .unwrap_or(Ipv4Addr::UNSPECIFIED);
                    let kind = classify::classify(&header);
                    let echoed_timestamp = match kind {
                        ReplyKind::EchoReply => packet::read_timestamp(datagram, payload_offset),
                        _ => None,
                    };
                    return Ok(Reply {
                        responder,
                        kind,
                        header,
                        received_at,
                        received_unix,
                        echoed_timestamp,
                    });
                }
                // Somebody else's traffic; keep waiting on what is left
                // of the budget.
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Needs a raw ICMP socket, so run it where that privilege exists:
    // cargo test -- --ignored
    #[test]
    #[ignore = "requires raw-socket privilege"]
    fn empty_socket_times_out_on_schedule() {
        let socket = EchoSocket::open().unwrap();
        let started = Instant::now();
        let result = socket.recv_matching(0x5555, None, Duration::from_millis(500));
        let waited = started.elapsed();
        assert_eq!(result, Err(PingError::Timeout));
        assert!(waited >= Duration::from_millis(450));
        assert!(waited < Duration::from_secs(2));
    }
}
