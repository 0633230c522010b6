//! Scan target: one IPv4 host and the port range to sweep.

use super::port::PortRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// The host being scanned, fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Target IPv4 address.
    pub host: Ipv4Addr,
    /// Ports to sweep. Defaults to the full 1-65535 space.
    pub ports: PortRange,
}

impl ScanTarget {
    /// Create a target covering every TCP port.
    pub fn new(host: Ipv4Addr) -> Self {
        Self {
            host,
            ports: PortRange::full(),
        }
    }

    /// Restrict the sweep to a narrower range.
    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = ports;
        self
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.host, self.ports)
    }
}

impl FromStr for ScanTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::Empty);
        }

        match s.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Ok(Self::new(v4)),
            Ok(IpAddr::V6(_)) => Err(TargetError::Ipv6Unsupported(s.to_string())),
            Err(_) => Err(TargetError::InvalidFormat(s.to_string())),
        }
    }
}

/// Error type for target parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("target host cannot be empty")]
    Empty,
    #[error("invalid target '{0}': expected an IPv4 address")]
    InvalidFormat(String),
    #[error("IPv6 targets are not supported: {0}")]
    Ipv6Unsupported(String),
}
