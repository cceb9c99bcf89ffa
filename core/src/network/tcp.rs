use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use pifleet_common::liveness::LivenessProbe;

/// Treats a host as alive if anything answers on `port`, even with a refusal.
pub struct TcpLiveness {
    port: u16,
}

impl TcpLiveness {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl LivenessProbe for TcpLiveness {
    async fn is_alive(&self, addr: Ipv4Addr, wait: Duration) -> bool {
        let socket_addr = SocketAddr::from((addr, self.port));
        match timeout(wait, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => e.kind() == std::io::ErrorKind::ConnectionRefused,
            Err(_elapsed) => false,
        }
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
