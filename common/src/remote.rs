//! # Remote Execution Capability
//!
//! The fleet core talks to devices only through these traits. The concrete transport
//! (SSH in `pifleet-core`) is an adapter; tests substitute their own.
//!
//! Connections are scoped to a single operation: open, use, close. Nothing caches them.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, ExecError};

/// Login used for every device in the fleet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "pi".to_string(),
            password: "raspberry".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best available explanation for a non-zero exit.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit status {}", self.exit_code)
        } else {
            format!("exit status {}: {stderr}", self.exit_code)
        }
    }
}

/// Opens sessions to devices.
#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn open(
        &self,
        addr: Ipv4Addr,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, ConnectError>;
}

/// An open session to one device.
///
/// Dropping a connection releases it as well; `close` is the polite way.
#[async_trait]
pub trait Connection: Send {
    fn peer(&self) -> Ipv4Addr;

    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, ExecError>;

    async fn close(&mut self);
}
