use std::fmt;
use std::str::FromStr;

use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hardware address of a device. This is the stable identity of every managed player.
///
/// Always rendered lowercase and colon separated, whatever the remote side printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Last two octets as hex, used to disambiguate generated names.
    pub fn tail(&self) -> String {
        format!("{:02x}{:02x}", self.0[4], self.0[5])
    }
}

impl FromStr for MacAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed: MacAddr = trimmed
            .parse()
            .map_err(|e| ConfigError::InvalidMac(format!("{trimmed}: {e}")))?;
        Ok(Self([parsed.0, parsed.1, parsed.2, parsed.3, parsed.4, parsed.5]))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{}", MacAddr::new(a, b, c, d, e, g))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}
