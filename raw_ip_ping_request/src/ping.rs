//! Ping-mode probe scheduling, plus the probe error type shared by both
//! schedulers.

use crate::classify::ReplyKind;
use crate::configuration::PingConfiguration;
use crate::transport::{EchoSocket, Reply};
use pnet::packet::icmp::{IcmpCode, IcmpType};
use std::io;
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum PingError {
    /// Raw ICMP sockets need elevated privilege; fatal, never retried.
    PermissionDenied,
    /// No matching reply within the attempt's time budget.
    Timeout,
    /// Datagram too short to hold an ICMP header at the computed offset.
    TruncatedPacket { len: usize },
    /// A router on the path dropped the probe.
    TimeExceeded {
        responder: Ipv4Addr,
        latency: Duration,
    },
    /// The network reports the destination cannot be reached.
    Unreachable {
        responder: Ipv4Addr,
        latency: Duration,
    },
    FailedToSendPacket(io::ErrorKind),
    SocketError(io::ErrorKind),
    /// A matched reply of a type outside the handled set.
    UnexpectedIcmpType {
        responder: Ipv4Addr,
        ty: IcmpType,
        code: IcmpCode,
    },
}

/// One attempt's outcome as handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub sequence: u16,
    pub result: Result<Duration, PingError>,
}

/// This process's pid masked to 16 bits: the ICMP identifier that keeps
/// our replies apart from other pingers on the host.
pub(crate) fn process_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

fn non_negative(seconds: f64) -> Duration {
    if seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        // Clock skew can make the interval come out non-positive.
        Duration::from_nanos(10)
    }
}

/// Maps a matched reply onto the attempt's outcome. Echo Replies take
/// their round-trip time from the echoed send timestamp when it survived
/// the trip, the wall clock otherwise; everything else is timed on the
/// wall clock.
pub(crate) fn reply_outcome(reply: &Reply, sent_at: Instant) -> Result<Duration, PingError> {
    let wall = if reply.received_at > sent_at {
        reply.received_at.duration_since(sent_at)
    } else {
        Duration::from_nanos(10)
    };
    match reply.kind {
        ReplyKind::EchoReply => Ok(match reply.echoed_timestamp {
            Some(sent_unix) => non_negative(reply.received_unix - sent_unix),
            None => wall,
        }),
        ReplyKind::TimeExceeded => Err(PingError::TimeExceeded {
            responder: reply.responder,
            latency: wall,
        }),
        ReplyKind::Unreachable => Err(PingError::Unreachable {
            responder: reply.responder,
            latency: wall,
        }),
        ReplyKind::Other(ty, code) => Err(PingError::UnexpectedIcmpType {
            responder: reply.responder,
            ty,
            code,
        }),
    }
}

/// One complete probe: fresh raw socket, send, filtered receive. The
/// socket closes on every exit path when it drops at the end of the call.
pub(crate) fn echo_probe(
    addr: Ipv4Addr,
    ttl: Option<u8>,
    identifier: u16,
    sequence: u16,
    match_sequence: bool,
    timeout: Duration,
) -> Result<Duration, PingError> {
    let socket = match ttl {
        Some(ttl) => EchoSocket::open_with_ttl(ttl)?,
        None => EchoSocket::open()?,
    };
    let sent_at = socket.send_echo(addr, identifier, sequence)?;
    let sequence_filter = if match_sequence { Some(sequence) } else { None };
    let reply = socket.recv_matching(identifier, sequence_filter, timeout)?;
    reply_outcome(&reply, sent_at)
}

/// Pings `addr` `conf.repeat` times, reporting every attempt to `report`
/// and returning the final attempt's outcome.
///
/// Attempts are spaced by `conf.interval`, with no pause after the last.
/// `PermissionDenied` aborts the run immediately. With a `repeat` of zero
/// nothing is sent and the result is `Timeout`.
pub fn ping(
    addr: Ipv4Addr,
    conf: &PingConfiguration,
    mut report: impl FnMut(PingRecord),
) -> Result<Duration, PingError> {
    let identifier = process_identifier();
    let mut last = Err(PingError::Timeout);
    for sequence in 1..=conf.repeat {
        let result = echo_probe(addr, None, identifier, sequence, true, conf.timeout);
        if let Err(PingError::PermissionDenied) = result {
            return result;
        }
        report(PingRecord {
            sequence,
            result: result.clone(),
        });
        last = result;
        if sequence < conf.repeat {
            thread::sleep(conf.interval);
        }
    }
    last
}
