//! # Fleet
//!
//! The entry point the CLI talks to. Owns the configured adapters and services and exposes
//! each fleet operation as one async call returning `Result<_, FleetError>`.
//!
//! Input is validated here, before any service touches the network.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::info;

use pifleet_common::config::Config;
use pifleet_common::error::{FleetError, StoreError};
use pifleet_common::liveness::LivenessProbe;
use pifleet_common::models::device::{Device, DeviceInfo, DeviceRef};
use pifleet_common::models::dispatch::{DispatchMode, DispatchResult, PlayerCommand};
use pifleet_common::models::lag::LagMeasurement;
use pifleet_common::models::scan::ScanReport;
use pifleet_common::models::setup::Setup;
use pifleet_common::network::range::Cidr;
use pifleet_common::remote::RemoteProbe;
use pifleet_common::store::Store;

use crate::dispatch::{DispatchSettings, FleetDispatcher};
use crate::lag::{LagEstimator, LagSettings};
use crate::network::liveness_probe;
use crate::probe::DeviceProbe;
use crate::ranges::resolve_range;
use crate::remote::SshProbe;
use crate::scanner::{ProgressCallback, ScanCoordinator, ScanSettings};
use crate::store::SqliteStore;

pub struct Fleet {
    config: Config,
    store: Arc<dyn Store>,
    remote: Arc<dyn RemoteProbe>,
    lag: Arc<LagEstimator>,
    probe: Arc<DeviceProbe>,
    scanner: ScanCoordinator,
    dispatcher: FleetDispatcher,
    on_scan_progress: Option<ProgressCallback>,
}

impl Fleet {
    /// Wires the services to the given adapters.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        remote: Arc<dyn RemoteProbe>,
        liveness: Arc<dyn LivenessProbe>,
    ) -> Self {
        let lag = Arc::new(LagEstimator::new(
            remote.clone(),
            store.clone(),
            LagSettings {
                credentials: config.credentials.clone(),
                connect_timeout: config.connect_timeout(),
                ping_timeout: config.ping_timeout(),
                exec_timeout: config.exec_timeout(),
            },
        ));
        let probe = Arc::new(DeviceProbe::new(lag.clone(), config.exec_timeout()));
        let scanner = ScanCoordinator::new(
            ScanSettings::from(&config),
            liveness,
            remote.clone(),
            store.clone(),
            probe.clone(),
        );
        let dispatcher = FleetDispatcher::new(remote.clone(), DispatchSettings::from(&config));

        Self {
            config,
            store,
            remote,
            lag,
            probe,
            scanner,
            dispatcher,
            on_scan_progress: None,
        }
    }

    /// The production wiring: SQLite at `config.database`, SSH, and the configured liveness probe.
    pub async fn open(config: Config) -> Result<Self, FleetError> {
        let store = SqliteStore::connect(&config.database).await?;
        let remote = SshProbe::new(config.ssh_port);
        let liveness = liveness_probe(&config);
        Ok(Self::new(config, Arc::new(store), Arc::new(remote), liveness))
    }

    pub fn on_scan_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_scan_progress = Some(callback);
        self
    }

    pub async fn scan(&self, range: &str) -> Result<ScanReport, FleetError> {
        let cidr = resolve_range(self.store.as_ref(), range).await?;
        self.scanner
            .scan(&cidr, self.on_scan_progress.clone())
            .await
    }

    pub async fn dispatch(&self, ip: Ipv4Addr, command: &str) -> Result<DispatchResult, FleetError> {
        let command: PlayerCommand = command.parse()?;
        let target = match self.store.device_by_ip(ip).await? {
            Some(device) => DeviceRef::from(&device),
            None => DeviceRef::address(ip),
        };
        Ok(self.dispatcher.dispatch(target, &command).await)
    }

    pub async fn dispatch_all(
        &self,
        range: &str,
        command: &str,
        mode: DispatchMode,
    ) -> Result<Vec<DispatchResult>, FleetError> {
        let command: PlayerCommand = command.parse()?;
        let cidr = resolve_range(self.store.as_ref(), range).await?;
        let devices = self.store.devices_in_range(&cidr).await?;
        Ok(self.dispatcher.dispatch_all(&devices, &command, mode).await)
    }

    /// Waits for detached dispatches to finish. Call before shutting the runtime down.
    pub async fn settle(&self) {
        self.dispatcher.settle().await;
    }

    pub async fn lag(&self, ip: Ipv4Addr) -> Result<LagMeasurement, FleetError> {
        Ok(self.lag.lag(ip).await?)
    }

    /// Makes `ip` the only master of its /24 and returns the updated device.
    pub async fn set_master(&self, ip: Ipv4Addr) -> Result<Device, FleetError> {
        self.store.set_master(ip).await?;
        info!("{ip} is now master of its subnet");
        self.store
            .device_by_ip(ip)
            .await?
            .ok_or_else(|| StoreError::NotFound(ip.to_string()).into())
    }

    /// Probes one device on demand without touching the store's device records.
    pub async fn metrics(&self, ip: Ipv4Addr) -> Result<DeviceInfo, FleetError> {
        let mut conn = self
            .remote
            .open(ip, &self.config.credentials, self.config.connect_timeout())
            .await?;
        let info = self.probe.probe(conn.as_mut()).await;
        conn.close().await;
        Ok(info?)
    }

    pub async fn register_setup(&self, name: &str, cidr: &str) -> Result<Setup, FleetError> {
        let cidr: Cidr = cidr.parse()?;
        let setup = self.store.upsert_setup(name, &cidr).await?;
        info!("Setup '{}' covers {}", setup.name, setup.iprange);
        Ok(setup)
    }

    pub async fn setups(&self) -> Result<Vec<Setup>, FleetError> {
        Ok(self.store.setups().await?)
    }

    /// Every device, or those of one range, ordered by sort rank then name.
    pub async fn devices(&self, range: Option<&str>) -> Result<Vec<Device>, FleetError> {
        match range {
            Some(range) => {
                let cidr = resolve_range(self.store.as_ref(), range).await?;
                Ok(self.store.devices_in_range(&cidr).await?)
            }
            None => Ok(self.store.all_devices().await?),
        }
    }
}
