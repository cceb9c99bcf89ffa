//! # Lag Estimation
//!
//! Latency of a device is the round trip of one ping it sends to the master of its /24.
//! The ping runs on the device, not here, so it reflects the player's own network path.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use pifleet_common::error::StoreError;
use pifleet_common::models::lag::LagMeasurement;
use pifleet_common::network::range::Subnet24;
use pifleet_common::remote::{Connection, Credentials, RemoteProbe};
use pifleet_common::store::Store;
use pifleet_protocols::ping;

#[derive(Debug, Clone)]
pub struct LagSettings {
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub ping_timeout: Duration,
    pub exec_timeout: Duration,
}

pub struct LagEstimator {
    remote: Arc<dyn RemoteProbe>,
    store: Arc<dyn Store>,
    settings: LagSettings,
}

impl LagEstimator {
    pub fn new(remote: Arc<dyn RemoteProbe>, store: Arc<dyn Store>, settings: LagSettings) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Measures `ip` over a session of its own.
    ///
    /// Only a store failure is an error. An offline device is `Unmeasurable`.
    pub async fn lag(&self, ip: Ipv4Addr) -> Result<LagMeasurement, StoreError> {
        let Some(master) = self.master_of(ip).await? else {
            return Ok(LagMeasurement::no_master());
        };

        let settings = &self.settings;
        let mut conn = match self
            .remote
            .open(ip, &settings.credentials, settings.connect_timeout)
            .await
        {
            Ok(conn) => conn,
            Err(e) => {
                debug!("Cannot measure lag of {ip}: {e}");
                return Ok(LagMeasurement::unreachable());
            }
        };

        let lag = self.ping(conn.as_mut(), master).await;
        conn.close().await;
        Ok(lag)
    }

    /// Measures the device behind an already open `conn`.
    pub async fn measure_with(
        &self,
        conn: &mut dyn Connection,
    ) -> Result<LagMeasurement, StoreError> {
        match self.master_of(conn.peer()).await? {
            Some(master) => Ok(self.ping(conn, master).await),
            None => Ok(LagMeasurement::no_master()),
        }
    }

    async fn master_of(&self, ip: Ipv4Addr) -> Result<Option<Ipv4Addr>, StoreError> {
        let master = self
            .store
            .master_candidate_by_prefix(Subnet24::of(ip))
            .await?;
        Ok(master.and_then(|device| device.ip))
    }

    async fn ping(&self, conn: &mut dyn Connection, master: Ipv4Addr) -> LagMeasurement {
        let command = ping::command(master, self.settings.ping_timeout);
        match conn.exec(&command, self.settings.exec_timeout).await {
            Ok(out) if out.success() => match ping::parse_rtt(&out.stdout) {
                Some(rtt) => LagMeasurement::measured(rtt),
                None => LagMeasurement::unreachable(),
            },
            Ok(out) => {
                debug!("{} could not ping {master}: {}", conn.peer(), out.failure_detail());
                LagMeasurement::unreachable()
            }
            Err(e) => {
                debug!("{} could not ping {master}: {e}", conn.peer());
                LagMeasurement::unreachable()
            }
        }
    }
}
