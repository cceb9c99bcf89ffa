//! # Scan Coordinator
//!
//! Sweeps a range for players and reconciles what it finds with the store.
//!
//! A pass is:
//! 1. validate the range and make sure a setup exists for it,
//! 2. snapshot the MACs the store already knows in that range,
//! 3. visit every candidate host on a bounded worker pool (liveness, session, probe, upsert),
//! 4. once every worker has joined, record an absence for each known MAC not seen.
//!
//! A host that fails at any stage is skipped for this pass without retry.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use pifleet_common::config::Config;
use pifleet_common::error::FleetError;
use pifleet_common::liveness::LivenessProbe;
use pifleet_common::models::scan::{ScanProgress, ScanReport};
use pifleet_common::network::mac::MacAddress;
use pifleet_common::network::range::Cidr;
use pifleet_common::remote::{Credentials, RemoteProbe};
use pifleet_common::store::Store;

use crate::probe::DeviceProbe;
use crate::ranges::ensure_scannable;

/// Called after every host of a pass has been visited.
pub type ProgressCallback = Arc<dyn Fn(ScanProgress) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub workers: usize,
    pub reserved_octets: Vec<u8>,
    pub credentials: Credentials,
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub missing_after: u32,
}

impl From<&Config> for ScanSettings {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers,
            reserved_octets: config.reserved_octets.clone(),
            credentials: config.credentials.clone(),
            ping_timeout: config.ping_timeout(),
            connect_timeout: config.connect_timeout(),
            missing_after: config.missing_after,
        }
    }
}

pub struct ScanCoordinator {
    settings: ScanSettings,
    worker: Arc<HostWorker>,
    store: Arc<dyn Store>,
}

/// What every scan task shares.
struct HostWorker {
    liveness: Arc<dyn LivenessProbe>,
    remote: Arc<dyn RemoteProbe>,
    store: Arc<dyn Store>,
    probe: Arc<DeviceProbe>,
    credentials: Credentials,
    ping_timeout: Duration,
    connect_timeout: Duration,
}

#[derive(Debug, Default)]
struct HostOutcome {
    alive: bool,
    reconciled: Option<MacAddress>,
}

impl ScanCoordinator {
    pub fn new(
        settings: ScanSettings,
        liveness: Arc<dyn LivenessProbe>,
        remote: Arc<dyn RemoteProbe>,
        store: Arc<dyn Store>,
        probe: Arc<DeviceProbe>,
    ) -> Self {
        let worker = Arc::new(HostWorker {
            liveness,
            remote,
            store: store.clone(),
            probe,
            credentials: settings.credentials.clone(),
            ping_timeout: settings.ping_timeout,
            connect_timeout: settings.connect_timeout,
        });
        Self {
            settings,
            worker,
            store,
        }
    }

    pub async fn scan(
        &self,
        cidr: &Cidr,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ScanReport, FleetError> {
        ensure_scannable(cidr)?;
        let started = Instant::now();
        let iprange = cidr.to_string();

        self.store.ensure_setup(cidr).await?;
        let known: BTreeSet<MacAddress> = self
            .store
            .devices_in_range(cidr)
            .await?
            .into_iter()
            .map(|device| device.mac)
            .collect();

        let candidates = cidr.hosts(&self.settings.reserved_octets);
        let total = candidates.len();
        info!(
            "Scanning {iprange}: {total} candidate hosts, {} known devices",
            known.len()
        );

        let outcomes = self.visit_all(&iprange, candidates, on_progress).await;

        let alive = outcomes.iter().filter(|o| o.alive).count();
        let scanned: BTreeSet<MacAddress> =
            outcomes.iter().filter_map(|o| o.reconciled).collect();
        let absent: Vec<MacAddress> = known.difference(&scanned).copied().collect();

        let flagged_missing = if absent.is_empty() {
            Vec::new()
        } else {
            self.store
                .mark_missing(&absent, self.settings.missing_after)
                .await?
        };

        let report = ScanReport {
            range: iprange,
            probed: total,
            alive,
            reconciled: scanned.into_iter().collect(),
            absent,
            flagged_missing,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            "Scan of {} done: {} alive, {} reconciled, {} absent, {} missing",
            report.range,
            report.alive,
            report.reconciled.len(),
            report.absent.len(),
            report.flagged_missing.len()
        );
        Ok(report)
    }

    /// Runs one task per host, never more than `workers` at a time, and waits for all of them.
    async fn visit_all(
        &self,
        iprange: &str,
        candidates: Vec<Ipv4Addr>,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<HostOutcome> {
        let total = candidates.len();
        let pool = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let done = Arc::new(AtomicUsize::new(0));
        let reconciled = Arc::new(AtomicUsize::new(0));
        let iprange: Arc<str> = Arc::from(iprange);
        let mut tasks = JoinSet::new();

        for ip in candidates {
            let Ok(permit) = pool.clone().acquire_owned().await else {
                error!("Worker pool closed, {ip} and later hosts skipped");
                break;
            };

            let worker = self.worker.clone();
            let iprange = iprange.clone();
            let done = done.clone();
            let reconciled = reconciled.clone();
            let on_progress = on_progress.clone();

            tasks.spawn(async move {
                let outcome = worker.visit(ip, &iprange).await;
                drop(permit);

                if outcome.reconciled.is_some() {
                    reconciled.fetch_add(1, Ordering::Relaxed);
                }
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = on_progress {
                    cb(ScanProgress {
                        done: finished,
                        total,
                        reconciled: reconciled.load(Ordering::Relaxed),
                    });
                }
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Scan worker died: {e}"),
            }
        }
        outcomes
    }
}

impl HostWorker {
    async fn visit(&self, ip: Ipv4Addr, iprange: &str) -> HostOutcome {
        if !self.liveness.is_alive(ip, self.ping_timeout).await {
            return HostOutcome::default();
        }
        let alive = HostOutcome {
            alive: true,
            reconciled: None,
        };

        let mut conn = match self
            .remote
            .open(ip, &self.credentials, self.connect_timeout)
            .await
        {
            Ok(conn) => conn,
            Err(e) => {
                debug!("Skipping {ip}: {e}");
                return alive;
            }
        };

        let probed = self.probe.probe(conn.as_mut()).await;
        conn.close().await;

        let info = match probed {
            Ok(info) => info,
            Err(e) => {
                debug!("Skipping {ip}: {e}");
                return alive;
            }
        };

        let Some(record) = info.into_record(iprange, Utc::now()) else {
            debug!("Skipping {ip}: no readable MAC address");
            return alive;
        };

        match self.store.upsert_device_by_mac(record).await {
            Ok(device) => {
                debug!("Reconciled {} ({}) at {ip}", device.name, device.mac);
                HostOutcome {
                    alive: true,
                    reconciled: Some(device.mac),
                }
            }
            Err(e) => {
                warn!("Could not store device at {ip}: {e}");
                alive
            }
        }
    }
}
