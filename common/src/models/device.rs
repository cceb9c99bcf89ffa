use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::lag::LagMeasurement;
use crate::network::mac::MacAddress;
use crate::network::range::Subnet24;

/// One telemetry field read from a device.
///
/// A sub-read that fails does not fail the probe; it leaves `Unknown` or `Failed` behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Value(String),
    #[default]
    Unknown,
    Failed(String),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.write_str(value),
            Self::Unknown => f.write_str("Unknown"),
            Self::Failed(detail) => write!(f, "Error: {detail}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub temperature: Reading,
    pub ram: Reading,
    pub storage: Reading,
}

/// What a probe of a live host produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub ip: Ipv4Addr,
    pub mac: Option<MacAddress>,
    pub model: Reading,
    pub telemetry: Telemetry,
    pub lag: LagMeasurement,
}

impl DeviceInfo {
    /// Turns probe output into a record the store can reconcile.
    ///
    /// Returns `None` when the MAC could not be read, since there is nothing to key on.
    pub fn into_record(self, iprange: &str, seen_at: DateTime<Utc>) -> Option<DeviceRecord> {
        let mac = self.mac?;
        Some(DeviceRecord {
            mac,
            ip: self.ip,
            iprange: iprange.to_string(),
            model: self.model,
            telemetry: self.telemetry,
            lag: self.lag,
            seen_at,
        })
    }
}

/// Fields observed during a scan, written by `upsert_device_by_mac`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub iprange: String,
    pub model: Reading,
    pub telemetry: Telemetry,
    pub lag: LagMeasurement,
    pub seen_at: DateTime<Utc>,
}

/// A managed player as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub mac: MacAddress,
    pub name: String,
    /// `None` once another device has been seen at this device's last address.
    pub ip: Option<Ipv4Addr>,
    pub iprange: String,
    pub model: Reading,
    pub telemetry: Telemetry,
    pub lag: Option<LagMeasurement>,
    pub master: bool,
    pub sort: i64,
    pub missing: bool,
    pub missed_scans: u32,
    pub last_connection: Option<DateTime<Utc>>,
}

impl Device {
    /// A freshly discovered device. User-owned fields start at their defaults.
    pub fn from_record(record: DeviceRecord, name: String) -> Self {
        Self {
            mac: record.mac,
            name,
            ip: Some(record.ip),
            iprange: record.iprange,
            model: record.model,
            telemetry: record.telemetry,
            lag: Some(record.lag),
            master: false,
            sort: 0,
            missing: false,
            missed_scans: 0,
            last_connection: Some(record.seen_at),
        }
    }

    /// Refreshes every observed field and clears the missing state.
    ///
    /// Name and sort order belong to the user and are left alone. The master flag is
    /// kept unless the device moved to another /24, where it was never chosen.
    pub fn apply(&mut self, record: DeviceRecord) {
        if self.ip.is_some_and(|old| !Subnet24::of(record.ip).contains(old)) {
            self.master = false;
        }
        self.ip = Some(record.ip);
        self.iprange = record.iprange;
        self.model = record.model;
        self.telemetry = record.telemetry;
        self.lag = Some(record.lag);
        self.missing = false;
        self.missed_scans = 0;
        self.last_connection = Some(record.seen_at);
    }

    /// Counts one scan without this device and flags it once `threshold` is reached.
    pub fn record_absence(&mut self, threshold: u32) {
        self.missed_scans = self.missed_scans.saturating_add(1);
        if self.missed_scans >= threshold.max(1) {
            self.missing = true;
        }
    }
}

/// Name given to a device on first discovery, e.g. `Device_10_0_0_3`.
pub fn default_device_name(ip: Ipv4Addr) -> String {
    format!("Device_{}", ip.to_string().replace('.', "_"))
}

/// Names to try, in order, for a newly discovered device.
///
/// The default name first, then with the MAC tail (`Device_10_0_0_3_3e4f`), then numbered
/// variants of that for the rare tail clash.
pub fn name_candidates(ip: Ipv4Addr, mac: &MacAddress) -> impl Iterator<Item = String> {
    let base = default_device_name(ip);
    let tagged = format!("{base}_{}", mac.tail());
    let numbered = tagged.clone();
    std::iter::once(base)
        .chain(std::iter::once(tagged))
        .chain((2u32..).map(move |n| format!("{numbered}_{n}")))
}

/// Just enough to say which device a dispatch outcome is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRef {
    pub ip: Option<Ipv4Addr>,
    pub name: Option<String>,
    pub mac: Option<MacAddress>,
}

impl DeviceRef {
    pub fn address(ip: Ipv4Addr) -> Self {
        Self {
            ip: Some(ip),
            name: None,
            mac: None,
        }
    }
}

impl From<&Device> for DeviceRef {
    fn from(device: &Device) -> Self {
        Self {
            ip: device.ip,
            name: Some(device.name.clone()),
            mac: Some(device.mac),
        }
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.ip) {
            (Some(name), Some(ip)) => write!(f, "{name} ({ip})"),
            (Some(name), None) => write!(f, "{name} (no address)"),
            (None, Some(ip)) => write!(f, "{ip}"),
            (None, None) => f.write_str("unknown device"),
        }
    }
}
