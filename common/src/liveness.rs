use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

/// Cheap "is anything there" check run before opening a session to a scan candidate.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, addr: Ipv4Addr, timeout: Duration) -> bool;
}
