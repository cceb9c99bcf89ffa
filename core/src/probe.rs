//! # Device Probe
//!
//! Reads identity and telemetry from a player over an open connection. Each read stands
//! alone: a failed command degrades its own field and the probe moves on.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use pifleet_common::error::{ExecError, ProbeError};
use pifleet_common::models::device::{DeviceInfo, Reading, Telemetry};
use pifleet_common::models::lag::LagMeasurement;
use pifleet_common::remote::{Connection, ExecOutput};
use pifleet_protocols::telemetry;

use crate::lag::LagEstimator;

pub struct DeviceProbe {
    lag: Arc<LagEstimator>,
    exec_timeout: Duration,
}

impl DeviceProbe {
    pub fn new(lag: Arc<LagEstimator>, exec_timeout: Duration) -> Self {
        Self { lag, exec_timeout }
    }

    /// Fails only if the connection could not run a single command.
    pub async fn probe(&self, conn: &mut dyn Connection) -> Result<DeviceInfo, ProbeError> {
        let ip = conn.peer();

        let mac = self.read(conn, telemetry::MAC_ADDRESS).await;
        let model = self.read(conn, telemetry::MODEL).await;
        let ram = self.read(conn, telemetry::RAM).await;
        let storage = self.read(conn, telemetry::STORAGE).await;
        let temperature = self.read(conn, telemetry::TEMPERATURE).await;

        let reads = [&mac, &model, &ram, &storage, &temperature];
        if reads.iter().all(|r| lost(r)) {
            return Err(ProbeError::Unusable {
                addr: ip,
                source: ExecError::Closed,
            });
        }

        let lag = match self.lag.measure_with(conn).await {
            Ok(lag) => lag,
            Err(e) => {
                warn!("Lag lookup for {ip} failed: {e}");
                LagMeasurement::unreachable()
            }
        };

        Ok(DeviceInfo {
            ip,
            mac: mac
                .ok()
                .filter(ExecOutput::success)
                .and_then(|out| telemetry::parse_mac(&out.stdout)),
            model: reading(ip, model, telemetry::parse_model),
            telemetry: Telemetry {
                temperature: reading(ip, temperature, telemetry::parse_temperature),
                ram: reading(ip, ram, telemetry::parse_ram),
                storage: reading(ip, storage, telemetry::parse_storage),
            },
            lag,
        })
    }

    async fn read(
        &self,
        conn: &mut dyn Connection,
        command: &str,
    ) -> Result<ExecOutput, ExecError> {
        conn.exec(command, self.exec_timeout).await
    }
}

fn lost(result: &Result<ExecOutput, ExecError>) -> bool {
    matches!(result, Err(e) if e.is_connection_lost())
}

fn reading(
    ip: Ipv4Addr,
    result: Result<ExecOutput, ExecError>,
    parse: fn(&str) -> Reading,
) -> Reading {
    match result {
        Ok(out) if out.success() => parse(&out.stdout),
        Ok(out) => Reading::Failed(out.failure_detail()),
        Err(e) => {
            debug!("Read on {ip} failed: {e}");
            Reading::Failed(e.to_string())
        }
    }
}
