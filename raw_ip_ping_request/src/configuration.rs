//! Explicit probe configuration: named fields, documented defaults,
//! flag parsing and JSON round-tripping for callers that persist a setup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn field_from_args<T: std::str::FromStr>(args: &[String], field_name: &str) -> Result<Option<T>, String>
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    let pos = match args.iter().position(|r| r == field_name) {
        Some(pos) => pos + 1,
        None => return Ok(None),
    };
    if args.len() <= pos {
        return Err(format!("Empty {} value", field_name));
    }
    args[pos]
        .parse::<T>()
        .map(Some)
        .map_err(|e| format!("Failed to parse {} value: {:?}", field_name, e))
}

/// Ping-mode parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingConfiguration {
    /// Per-attempt reply budget. Default 1 second.
    pub timeout: Duration,
    /// Total number of attempts. Default 3.
    pub repeat: u16,
    /// Pause between attempts (none after the last). Default 1 second.
    pub interval: Duration,
}

impl Default for PingConfiguration {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            repeat: 3,
            interval: Duration::from_secs(1),
        }
    }
}

impl PingConfiguration {
    /// Reads `--ping_timeout <ms>`, `--repeat <n>` and `--interval <ms>`,
    /// falling back to the defaults for absent flags.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let defaults = Self::default();
        let timeout: Option<u64> = field_from_args(args, "--ping_timeout")?;
        let repeat: Option<u16> = field_from_args(args, "--repeat")?;
        let interval: Option<u64> = field_from_args(args, "--interval")?;

        Ok(Self {
            timeout: timeout.map(Duration::from_millis).unwrap_or(defaults.timeout),
            repeat: repeat.unwrap_or(defaults.repeat),
            interval: interval.map(Duration::from_millis).unwrap_or(defaults.interval),
        })
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| format!("Bad ping configuration: {}", e))
    }

    pub fn to_json(&self) -> String {
        // Serialization of these plain fields cannot fail.
        serde_json::to_string(self).unwrap()
    }
}

/// Traceroute-mode parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracerouteConfiguration {
    /// Upper bound on probed hops; ttl runs `1..max_hops`. Default 30.
    pub max_hops: u8,
    /// Probes per ttl before giving that hop up. Default 2.
    pub tries: u8,
    /// Per-attempt reply budget. Default 2 seconds.
    pub timeout: Duration,
}

impl Default for TracerouteConfiguration {
    fn default() -> Self {
        Self {
            max_hops: 30,
            tries: 2,
            timeout: Duration::from_secs(2),
        }
    }
}

impl TracerouteConfiguration {
    /// Reads `--max_hops <n>`, `--tries <n>` and `--trace_timeout <ms>`,
    /// falling back to the defaults for absent flags.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let defaults = Self::default();
        let max_hops: Option<u8> = field_from_args(args, "--max_hops")?;
        let tries: Option<u8> = field_from_args(args, "--tries")?;
        let timeout: Option<u64> = field_from_args(args, "--trace_timeout")?;

        Ok(Self {
            max_hops: max_hops.unwrap_or(defaults.max_hops),
            tries: tries.unwrap_or(defaults.tries),
            timeout: timeout.map(Duration::from_millis).unwrap_or(defaults.timeout),
        })
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| format!("Bad traceroute configuration: {}", e))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
