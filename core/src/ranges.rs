use tracing::debug;

use pifleet_common::error::{ConfigError, FleetError};
use pifleet_common::network::range::Cidr;
use pifleet_common::store::Store;

/// Shortest prefix a scan accepts. A /16 is already 65k hosts.
pub const MIN_SCAN_PREFIX: u8 = 16;

/// Resolves a range key: a literal CIDR, or the CIDR, slug or name of a known setup.
pub async fn resolve_range(store: &dyn Store, key: &str) -> Result<Cidr, FleetError> {
    let key = key.trim();
    if key.contains('/') {
        return Ok(key.parse()?);
    }

    let setup = store
        .setup(key)
        .await?
        .ok_or_else(|| ConfigError::UnknownRange(key.to_string()))?;
    debug!("Range '{key}' resolved to setup '{}' ({})", setup.name, setup.iprange);
    Ok(setup.iprange.parse()?)
}

/// Rejects blocks too large to sweep host by host.
pub fn ensure_scannable(cidr: &Cidr) -> Result<(), ConfigError> {
    if cidr.prefix() < MIN_SCAN_PREFIX {
        return Err(ConfigError::RangeTooLarge(cidr.to_string()));
    }
    Ok(())
}
