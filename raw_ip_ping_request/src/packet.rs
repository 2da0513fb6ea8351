//! ICMP Echo wire codec: builds outgoing Echo Requests and pulls the ICMP
//! header back out of a received raw IPv4 datagram.

use crate::checksum::internet_checksum;
use crate::ping::PingError;
use pnet::packet::icmp::{IcmpCode, IcmpType, IcmpTypes};
use std::time::{SystemTime, UNIX_EPOCH};

/// Fixed ICMP header size.
pub const ICMP_HEADER_LEN: usize = 8;
/// The Echo payload is a single packed f64: seconds since the epoch at
/// send time.
pub const TIMESTAMP_LEN: usize = 8;
/// Total size of an outgoing Echo Request.
pub const ECHO_PACKET_LEN: usize = ICMP_HEADER_LEN + TIMESTAMP_LEN;

/// The fields of an ICMP header, decoded from the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcmpHeader {
    pub ty: IcmpType,
    pub code: IcmpCode,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

/// Current wall-clock time as seconds since the epoch.
pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Builds a checksummed Echo Request carrying the current time as its
/// payload.
pub fn build_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    build_echo_request_at(identifier, sequence, unix_now())
}

/// Same as [`build_echo_request`] with an explicit payload timestamp.
pub fn build_echo_request_at(identifier: u16, sequence: u16, sent_at: f64) -> Vec<u8> {
    let mut packet = vec![0u8; ECHO_PACKET_LEN];
    packet[0] = IcmpTypes::EchoRequest.0;
    packet[1] = 0; // code
    // checksum stays zero for the first pass
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    packet[8..16].copy_from_slice(&sent_at.to_ne_bytes());

    let sum = internet_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum_to_wire(sum));
    packet
}

/// Converts the computed checksum into the byte order the platform's raw
/// ICMP stack expects. BSD-derived stacks want the value masked to 16 bits
/// after the host-to-network conversion; everywhere else the plain
/// conversion is enough.
fn checksum_to_wire(value: u16) -> [u8; 2] {
    if cfg!(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )) {
        (value.to_be() & 0xFFFF).to_ne_bytes()
    } else {
        value.to_be().to_ne_bytes()
    }
}

/// Locates and decodes the ICMP header inside a raw IPv4 datagram.
///
/// The low nibble of the first byte is the IP header length in 32-bit
/// words; the ICMP message starts at that offset. Returns the header and
/// the offset of the first payload byte after it.
pub fn parse_icmp_header(datagram: &[u8]) -> Result<(IcmpHeader, usize), PingError> {
    let ip_header_len = match datagram.first() {
        Some(first) => ((first & 0x0F) as usize) * 4,
        None => return Err(PingError::TruncatedPacket { len: 0 }),
    };
    let end = ip_header_len + ICMP_HEADER_LEN;
    if datagram.len() < end {
        return Err(PingError::TruncatedPacket {
            len: datagram.len(),
        });
    }

    let header = &datagram[ip_header_len..end];
    Ok((
        IcmpHeader {
            ty: IcmpType(header[0]),
            code: IcmpCode(header[1]),
            checksum: u16::from_be_bytes([header[2], header[3]]),
            identifier: u16::from_be_bytes([header[4], header[5]]),
            sequence: u16::from_be_bytes([header[6], header[7]]),
        },
        end,
    ))
}

/// Reads the packed f64 send timestamp an Echo Reply carries right after
/// its header. `None` when the reply came back without the full payload.
pub fn read_timestamp(datagram: &[u8], payload_offset: usize) -> Option<f64> {
    let bytes = datagram.get(payload_offset..payload_offset + TIMESTAMP_LEN)?;
    let mut raw = [0u8; TIMESTAMP_LEN];
    raw.copy_from_slice(bytes);
    Some(f64::from_ne_bytes(raw))
}

#[cfg(test)]
mod test {
    use super::*;

    // 20-byte option-less IPv4 header in front of an ICMP message.
    fn with_ip_header(icmp: &[u8]) -> Vec<u8> {
        let mut datagram = vec![0u8; 20 + icmp.len()];
        datagram[0] = 0x45;
        datagram[20..].copy_from_slice(icmp);
        datagram
    }

    #[test]
    fn echo_request_layout() {
        let packet = build_echo_request(0x1234, 7);
        assert_eq!(packet.len(), ECHO_PACKET_LEN);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), 0x1234);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 7);
    }

    #[test]
    fn echo_request_checksum_verifies() {
        let packet = build_echo_request_at(1234, 1, 1_700_000_000.25);
        assert_eq!(internet_checksum(&packet), 0);
    }

    #[test]
    fn payload_timestamp_round_trips() {
        let packet = build_echo_request_at(99, 2, 1_234_567_890.125);
        assert_eq!(
            read_timestamp(&packet, ICMP_HEADER_LEN),
            Some(1_234_567_890.125)
        );
    }

    #[test]
    fn parse_skips_the_ip_header() {
        let request = build_echo_request_at(0xBEEF, 3, 0.0);
        let datagram = with_ip_header(&request);
        let (header, payload_offset) = parse_icmp_header(&datagram).unwrap();
        assert_eq!(header.ty, IcmpTypes::EchoRequest);
        assert_eq!(header.identifier, 0xBEEF);
        assert_eq!(header.sequence, 3);
        assert_eq!(payload_offset, 28);
    }

    #[test]
    fn parse_honors_ip_options() {
        // IHL = 6: a 24-byte IP header.
        let request = build_echo_request_at(42, 1, 0.0);
        let mut datagram = vec![0u8; 24 + request.len()];
        datagram[0] = 0x46;
        datagram[24..].copy_from_slice(&request);
        let (header, payload_offset) = parse_icmp_header(&datagram).unwrap();
        assert_eq!(header.identifier, 42);
        assert_eq!(payload_offset, 32);
    }

    #[test]
    fn parse_rejects_short_datagrams() {
        let datagram = with_ip_header(&[0u8; 7]);
        match parse_icmp_header(&datagram) {
            Err(PingError::TruncatedPacket { len: 27 }) => (),
            other => panic!("expected TruncatedPacket, got {:?}", other),
        }
        assert!(matches!(
            parse_icmp_header(&[]),
            Err(PingError::TruncatedPacket { len: 0 })
        ));
    }
}
