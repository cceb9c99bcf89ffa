//! # Address Range Model
//!
//! CIDR blocks that group managed devices, and the host enumeration used by scans.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ConfigError;

/// Last octets skipped by default when enumerating scan candidates.
///
/// `.1` is usually the gateway, `.245` is a site convention for the management box.
pub const DEFAULT_RESERVED_OCTETS: [u8; 3] = [1, 245, 255];

/// A continuous range of IPv4 addresses, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + Clone {
        let start: u32 = u32::from(self.start_addr);
        let end: u32 = u32::from(self.end_addr);
        (start..=end).map(Ipv4Addr::from)
    }
}

/// A validated IPv4 CIDR block in canonical network form (`10.0.0.0/29`).
///
/// Host bits are accepted on input and cleared, so `192.168.1.7/24` becomes `192.168.1.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr(Ipv4Network);

impl Cidr {
    pub fn prefix(&self) -> u8 {
        self.0.prefix()
    }

    pub fn range(&self) -> Ipv4Range {
        Ipv4Range::new(self.0.network(), self.0.broadcast())
    }

    /// Every address worth probing in this block.
    ///
    /// Network and broadcast addresses are dropped for prefixes up to /30; /31 and /32
    /// have no such addresses. Hosts whose last octet is listed in `reserved` are skipped.
    pub fn hosts(&self, reserved: &[u8]) -> Vec<Ipv4Addr> {
        let range = self.range();
        let usable = if self.prefix() >= 31 {
            range
        } else {
            let start = u32::from(range.start_addr).saturating_add(1);
            let end = u32::from(range.end_addr).saturating_sub(1);
            Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end))
        };

        usable
            .iter()
            .filter(|ip| !reserved.contains(&ip.octets()[3]))
            .collect()
    }
}

impl FromStr for Cidr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |detail: String| ConfigError::InvalidCidr {
            input: input.to_string(),
            detail,
        };

        if !input.contains('/') {
            return Err(invalid("missing prefix length".to_string()));
        }

        let parsed: Ipv4Network = input.parse().map_err(|e| invalid(format!("{e}")))?;
        let canonical = Ipv4Network::new(parsed.network(), parsed.prefix())
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self(canonical))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.network(), self.0.prefix())
    }
}

/// The /24 an address belongs to. Master election and lag lookups are scoped to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet24([u8; 3]);

impl Subnet24 {
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        Self::of(ip) == *self
    }
}

impl fmt::Display for Subnet24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}.0/24")
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
