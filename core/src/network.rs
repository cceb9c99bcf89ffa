//! Liveness checks run before a scan worker opens a session.

use std::sync::Arc;

use tracing::debug;

use pifleet_common::config::{Config, LivenessMode};
use pifleet_common::liveness::LivenessProbe;

pub mod icmp;
pub mod tcp;

pub use icmp::IcmpLiveness;
pub use tcp::TcpLiveness;

/// Picks the liveness probe for `config`. `auto` uses ICMP only when privileged.
pub fn liveness_probe(config: &Config) -> Arc<dyn LivenessProbe> {
    let icmp = match config.liveness {
        LivenessMode::Icmp => true,
        LivenessMode::Tcp => false,
        LivenessMode::Auto => is_root::is_root(),
    };

    if icmp {
        debug!("Using ICMP echo for liveness");
        Arc::new(IcmpLiveness)
    } else {
        debug!("Using TCP connect to port {} for liveness", config.ssh_port);
        Arc::new(TcpLiveness::new(config.ssh_port))
    }
}
