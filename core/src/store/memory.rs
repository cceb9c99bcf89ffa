use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use pifleet_common::error::StoreError;
use pifleet_common::models::device::{
    Device, DeviceRecord, name_candidates,
};
use pifleet_common::models::setup::Setup;
use pifleet_common::network::mac::MacAddress;
use pifleet_common::network::range::{Cidr, Subnet24};
use pifleet_common::store::Store;

#[derive(Default)]
struct Tables {
    devices: BTreeMap<MacAddress, Device>,
    setups: BTreeMap<String, Setup>,
}

/// Process-local store. Every call is one critical section over both tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a device as-is, bypassing reconciliation.
    pub async fn insert(&self, device: Device) {
        self.tables.lock().await.devices.insert(device.mac, device);
    }
}

fn sorted(mut devices: Vec<Device>) -> Vec<Device> {
    devices.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.name.cmp(&b.name)));
    devices
}

#[async_trait]
impl Store for MemoryStore {
    async fn setup(&self, key: &str) -> Result<Option<Setup>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.setups.values().find(|s| s.matches(key)).cloned())
    }

    async fn setups(&self) -> Result<Vec<Setup>, StoreError> {
        Ok(self.tables.lock().await.setups.values().cloned().collect())
    }

    async fn upsert_setup(&self, name: &str, cidr: &Cidr) -> Result<Setup, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let setup = tables
            .setups
            .entry(cidr.to_string())
            .and_modify(|existing| existing.rename(name, now))
            .or_insert_with(|| Setup::new(name, cidr, now));
        Ok(setup.clone())
    }

    async fn ensure_setup(&self, cidr: &Cidr) -> Result<Setup, StoreError> {
        let mut tables = self.tables.lock().await;
        let setup = tables
            .setups
            .entry(cidr.to_string())
            .or_insert_with(|| Setup::new("", cidr, Utc::now()));
        Ok(setup.clone())
    }

    async fn devices_in_range(&self, cidr: &Cidr) -> Result<Vec<Device>, StoreError> {
        let key = cidr.to_string();
        let tables = self.tables.lock().await;
        let devices = tables
            .devices
            .values()
            .filter(|d| d.iprange == key)
            .cloned()
            .collect();
        Ok(sorted(devices))
    }

    async fn all_devices(&self) -> Result<Vec<Device>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(sorted(tables.devices.values().cloned().collect()))
    }

    async fn device_by_ip(&self, ip: Ipv4Addr) -> Result<Option<Device>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.devices.values().find(|d| d.ip == Some(ip)).cloned())
    }

    async fn upsert_device_by_mac(&self, record: DeviceRecord) -> Result<Device, StoreError> {
        let mut tables = self.tables.lock().await;

        for other in tables.devices.values_mut() {
            if other.mac != record.mac && other.ip == Some(record.ip) {
                other.ip = None;
            }
        }

        let subnet = Subnet24::of(record.ip);
        let master_elsewhere = tables.devices.values().any(|d| {
            d.mac != record.mac && d.master && d.ip.is_some_and(|ip| subnet.contains(ip))
        });

        if let Some(existing) = tables.devices.get_mut(&record.mac) {
            existing.apply(record);
            if master_elsewhere {
                existing.master = false;
            }
            return Ok(existing.clone());
        }

        let Some(name) = name_candidates(record.ip, &record.mac)
            .find(|name| !tables.devices.values().any(|d| &d.name == name))
        else {
            return Err(StoreError::Backend("no free device name".to_string()));
        };
        let device = Device::from_record(record, name);
        tables.devices.insert(device.mac, device.clone());
        Ok(device)
    }

    async fn mark_missing(
        &self,
        macs: &[MacAddress],
        threshold: u32,
    ) -> Result<Vec<MacAddress>, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut flagged = Vec::new();
        for mac in macs {
            if let Some(device) = tables.devices.get_mut(mac) {
                device.record_absence(threshold);
                if device.missing {
                    flagged.push(*mac);
                }
            }
        }
        Ok(flagged)
    }

    async fn master_candidate_by_prefix(
        &self,
        subnet: Subnet24,
    ) -> Result<Option<Device>, StoreError> {
        let tables = self.tables.lock().await;
        let candidates = tables
            .devices
            .values()
            .filter(|d| d.master && d.ip.is_some_and(|ip| subnet.contains(ip)))
            .cloned()
            .collect();
        Ok(sorted(candidates).into_iter().next())
    }

    async fn set_master(&self, ip: Ipv4Addr) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.devices.values().any(|d| d.ip == Some(ip)) {
            return Err(StoreError::NotFound(ip.to_string()));
        }

        let subnet = Subnet24::of(ip);
        for device in tables.devices.values_mut() {
            match device.ip {
                Some(addr) if addr == ip => device.master = true,
                Some(addr) if subnet.contains(addr) => device.master = false,
                _ => {}
            }
        }
        Ok(())
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
