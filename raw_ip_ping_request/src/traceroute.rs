//! Hop-by-hop path discovery: Echo Requests with increasing TTL values,
//! classified replies deciding when to move on and when to stop.

pub use crate::ping::PingError;
use crate::configuration::TracerouteConfiguration;
use crate::ping::{echo_probe, process_identifier};
use std::net::Ipv4Addr;
use std::time::Duration;

/// What answered at one hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopKind {
    /// Time Exceeded from a router on the way.
    Intermediate,
    /// Destination Unreachable.
    Unreachable,
    /// Echo Reply from the destination itself.
    Destination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteNode {
    pub addr: Ipv4Addr,
    pub latency: Duration,
    pub kind: HopKind,
}

/// One attempt's outcome as handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct HopRecord {
    pub ttl: u8,
    pub attempt: u8,
    pub result: Result<RouteNode, PingError>,
}

/// Walks the path to `addr`: for each ttl in `1..max_hops`, up to
/// `conf.tries` probes, each on its own raw socket with the TTL pinned.
///
/// Every attempt is reported to `report`. A Time Exceeded or Destination
/// Unreachable reply closes the current ttl and moves to the next; an
/// Echo Reply is the destination and ends the walk, its latency computed
/// from the echoed send timestamp. Returns the destination node when it
/// was reached. Only `PermissionDenied` aborts the walk.
pub fn trace_route(
    addr: Ipv4Addr,
    conf: &TracerouteConfiguration,
    mut report: impl FnMut(HopRecord),
) -> Result<Option<RouteNode>, PingError> {
    let identifier = process_identifier();
    let mut sequence = 0u16;

    for ttl in 1..conf.max_hops {
        for attempt in 0..conf.tries {
            sequence = sequence.wrapping_add(1);
            let result = echo_probe(addr, Some(ttl), identifier, sequence, false, conf.timeout);
            match result {
                Ok(latency) => {
                    let node = RouteNode {
                        addr,
                        latency,
                        kind: HopKind::Destination,
                    };
                    report(HopRecord {
                        ttl,
                        attempt,
                        result: Ok(node.clone()),
                    });
                    return Ok(Some(node));
                }
                Err(PingError::TimeExceeded { responder, latency }) => {
                    report(HopRecord {
                        ttl,
                        attempt,
                        result: Ok(RouteNode {
                            addr: responder,
                            latency,
                            kind: HopKind::Intermediate,
                        }),
                    });
                    break;
                }
                Err(PingError::Unreachable { responder, latency }) => {
                    report(HopRecord {
                        ttl,
                        attempt,
                        result: Ok(RouteNode {
                            addr: responder,
                            latency,
                            kind: HopKind::Unreachable,
                        }),
                    });
                    break;
                }
                Err(PingError::PermissionDenied) => return Err(PingError::PermissionDenied),
                Err(error @ PingError::UnexpectedIcmpType { .. }) => {
                    report(HopRecord {
                        ttl,
                        attempt,
                        result: Err(error),
                    });
                    break;
                }
                // Timeout and transient socket trouble burn this try and
                // leave the rest of the ttl's tries in play.
                Err(error) => {
                    report(HopRecord {
                        ttl,
                        attempt,
                        result: Err(error),
                    });
                }
            }
        }
    }
    Ok(None)
}
