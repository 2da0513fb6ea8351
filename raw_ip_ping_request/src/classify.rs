//! Interprets received ICMP messages and ties them back to the probe that
//! triggered them.

use crate::packet::{self, IcmpHeader};
use pnet::packet::icmp::{IcmpCode, IcmpType, IcmpTypes};

/// The reply classes the schedulers act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyKind {
    /// Echo Reply: the destination answered.
    EchoReply,
    /// Time Exceeded: a router on the path dropped the probe.
    TimeExceeded,
    /// Destination Unreachable.
    Unreachable,
    /// Anything outside the handled set.
    Other(IcmpType, IcmpCode),
}

pub fn classify(header: &IcmpHeader) -> ReplyKind {
    match header.ty {
        IcmpTypes::EchoReply => ReplyKind::EchoReply,
        IcmpTypes::TimeExceeded => ReplyKind::TimeExceeded,
        IcmpTypes::DestinationUnreachable => ReplyKind::Unreachable,
        ty => ReplyKind::Other(ty, header.code),
    }
}

/// Recovers the (identifier, sequence) of the Echo Request a reply answers.
///
/// An Echo Reply carries them in its own header. Error-class messages
/// (Time Exceeded, Destination Unreachable and friends) instead quote the
/// offending datagram after their header: the original IP header followed
/// by the leading bytes of our Echo Request, which parses with the same
/// IHL arithmetic as a fresh datagram. Returns `None` when the reply
/// cannot be attributed to any echo probe.
pub fn echoed_identity(datagram: &[u8], header: &IcmpHeader, payload_offset: usize) -> Option<(u16, u16)> {
    match classify(header) {
        ReplyKind::EchoReply => Some((header.identifier, header.sequence)),
        // A looped-back request of our own is not a reply.
        ReplyKind::Other(IcmpTypes::EchoRequest, _) => None,
        _ => {
            let quoted = datagram.get(payload_offset..)?;
            let (inner, _) = packet::parse_icmp_header(quoted).ok()?;
            if inner.ty == IcmpTypes::EchoRequest {
                Some((inner.identifier, inner.sequence))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{build_echo_request_at, parse_icmp_header, ICMP_HEADER_LEN};

    fn header(ty: u8, code: u8, identifier: u16, sequence: u16) -> IcmpHeader {
        IcmpHeader {
            ty: IcmpType(ty),
            code: IcmpCode(code),
            checksum: 0,
            identifier,
            sequence,
        }
    }

    // Raw IPv4 datagram (20-byte header) wrapping an ICMP message.
    fn datagram(icmp: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 20 + icmp.len()];
        buf[0] = 0x45;
        buf[20..].copy_from_slice(icmp);
        buf
    }

    // Time Exceeded / Unreachable message quoting one of our requests.
    fn error_reply(ty: u8, quoted: &[u8]) -> Vec<u8> {
        let mut icmp = vec![0u8; ICMP_HEADER_LEN];
        icmp[0] = ty;
        icmp.extend_from_slice(&datagram(quoted));
        datagram(&icmp)
    }

    #[test]
    fn classifies_the_handled_types() {
        assert_eq!(classify(&header(0, 0, 0, 0)), ReplyKind::EchoReply);
        assert_eq!(classify(&header(11, 0, 0, 0)), ReplyKind::TimeExceeded);
        assert_eq!(classify(&header(3, 1, 0, 0)), ReplyKind::Unreachable);
        assert_eq!(
            classify(&header(5, 2, 0, 0)),
            ReplyKind::Other(IcmpType(5), IcmpCode(2))
        );
    }

    #[test]
    fn echo_reply_identity_is_direct() {
        let reply = header(0, 0, 0x1234, 9);
        let buf = datagram(&build_echo_request_at(0x1234, 9, 0.0));
        assert_eq!(echoed_identity(&buf, &reply, 28), Some((0x1234, 9)));
    }

    #[test]
    fn error_replies_are_attributed_through_the_quote() {
        let request = build_echo_request_at(0xCAFE, 5, 0.0);
        let buf = error_reply(11, &request[..ICMP_HEADER_LEN]);
        let (outer, payload_offset) = parse_icmp_header(&buf).unwrap();
        assert_eq!(classify(&outer), ReplyKind::TimeExceeded);
        assert_eq!(
            echoed_identity(&buf, &outer, payload_offset),
            Some((0xCAFE, 5))
        );

        let buf = error_reply(3, &request[..ICMP_HEADER_LEN]);
        let (outer, payload_offset) = parse_icmp_header(&buf).unwrap();
        assert_eq!(
            echoed_identity(&buf, &outer, payload_offset),
            Some((0xCAFE, 5))
        );
    }

    #[test]
    fn foreign_traffic_is_not_attributed() {
        // Our own outgoing request seen on the socket.
        let buf = datagram(&build_echo_request_at(7, 1, 0.0));
        let (outer, payload_offset) = parse_icmp_header(&buf).unwrap();
        assert_eq!(echoed_identity(&buf, &outer, payload_offset), None);

        // A Time Exceeded quoting somebody else's UDP datagram.
        let mut quoted = vec![0u8; ICMP_HEADER_LEN];
        quoted[0] = 17;
        let buf = error_reply(11, &quoted);
        let (outer, payload_offset) = parse_icmp_header(&buf).unwrap();
        assert_eq!(echoed_identity(&buf, &outer, payload_offset), None);
    }
}
