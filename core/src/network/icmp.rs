use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::trace;

use pifleet_common::liveness::LivenessProbe;

const PAYLOAD: [u8; 56] = [0; 56];

/// One ICMP echo request. Needs raw socket privileges on most systems.
pub struct IcmpLiveness;

#[async_trait]
impl LivenessProbe for IcmpLiveness {
    async fn is_alive(&self, addr: Ipv4Addr, wait: Duration) -> bool {
        let target = IpAddr::V4(addr);
        match timeout(wait, surge_ping::ping(target, &PAYLOAD)).await {
            Ok(Ok((_packet, rtt))) => {
                trace!("{addr} answered echo in {rtt:?}");
                true
            }
            Ok(Err(e)) => {
                trace!("Echo to {addr} failed: {e}");
                false
            }
            Err(_elapsed) => false,
        }
    }
}
