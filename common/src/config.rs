use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::network::range::DEFAULT_RESERVED_OCTETS;
use crate::remote::Credentials;

/// How scan candidates are checked for life before a session is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessMode {
    /// ICMP when running privileged, TCP otherwise.
    #[default]
    Auto,
    Icmp,
    /// Connect to the SSH port. Works without raw socket privileges.
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: Credentials,
    pub ssh_port: u16,

    /// Width of the scan worker pool.
    pub workers: usize,

    /// Last octets never probed during a scan.
    pub reserved_octets: Vec<u8>,

    pub ping_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub exec_timeout_ms: u64,

    /// Consecutive absent scans before a device is flagged missing.
    pub missing_after: u32,

    pub liveness: LivenessMode,

    /// SQLite database holding devices and setups.
    pub database: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            ssh_port: 22,
            workers: 50,
            reserved_octets: DEFAULT_RESERVED_OCTETS.to_vec(),
            ping_timeout_ms: 1_000,
            connect_timeout_ms: 5_000,
            exec_timeout_ms: 15_000,
            missing_after: 1,
            liveness: LivenessMode::Auto,
            database: PathBuf::from("devices.db"),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if given, then `PIFLEET_*` environment variables.
    ///
    /// Nested keys use a double underscore: `PIFLEET_CREDENTIALS__PASSWORD`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Load(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            debug!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed("PIFLEET_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }
}
