//! Raw-socket ICMP Echo probing.
//!
//! One library, two schedulers: `ping` fires a fixed number of Echo
//! Requests at a destination and reports per-attempt round-trip times,
//! `traceroute` walks the path hop by hop with increasing TTL values.
//! Both run single-threaded over one raw IPv4 socket per attempt.

pub mod checksum;
pub mod classify;
pub mod configuration;
pub mod packet;
pub mod ping;
pub mod traceroute;
pub mod transport;

pub use ping::{PingError, PingRecord};
pub use traceroute::{HopKind, HopRecord, RouteNode};
