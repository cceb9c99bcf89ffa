//! # Store Capability
//!
//! Durable device and setup records. The fleet core never persists anything itself.
//!
//! Every mutating call is one self-contained transaction: concurrent scan workers may call
//! `upsert_device_by_mac` at the same time and must never observe a half-written record.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::device::{Device, DeviceRecord};
use crate::models::setup::Setup;
use crate::network::mac::MacAddress;
use crate::network::range::{Cidr, Subnet24};

#[async_trait]
pub trait Store: Send + Sync {
    /// Looks a setup up by CIDR, slug or name.
    async fn setup(&self, key: &str) -> Result<Option<Setup>, StoreError>;

    async fn setups(&self) -> Result<Vec<Setup>, StoreError>;

    /// Creates the setup for `cidr`, or renames it if it exists.
    async fn upsert_setup(&self, name: &str, cidr: &Cidr) -> Result<Setup, StoreError>;

    /// Creates a setup named after `cidr` unless one exists. Never renames.
    async fn ensure_setup(&self, cidr: &Cidr) -> Result<Setup, StoreError>;

    async fn devices_in_range(&self, cidr: &Cidr) -> Result<Vec<Device>, StoreError>;

    /// All devices ordered by sort rank, then name.
    async fn all_devices(&self) -> Result<Vec<Device>, StoreError>;

    async fn device_by_ip(&self, ip: Ipv4Addr) -> Result<Option<Device>, StoreError>;

    /// Inserts the device if its MAC is new, otherwise refreshes every observed field
    /// and clears the missing flag. Another device holding the same IP loses it.
    ///
    /// A device never carries the master flag into a /24 that already has a master.
    async fn upsert_device_by_mac(&self, record: DeviceRecord) -> Result<Device, StoreError>;

    /// Records one absent scan for each MAC and flags those that reached `threshold`.
    ///
    /// Returns the MACs among `macs` that carry the missing flag afterwards.
    async fn mark_missing(
        &self,
        macs: &[MacAddress],
        threshold: u32,
    ) -> Result<Vec<MacAddress>, StoreError>;

    /// First device flagged master whose address lies in `subnet`.
    async fn master_candidate_by_prefix(
        &self,
        subnet: Subnet24,
    ) -> Result<Option<Device>, StoreError>;

    /// Clears every master flag in the /24 of `ip` and sets it on `ip`, atomically.
    ///
    /// Fails with `NotFound`, changing nothing, when no device has that address.
    async fn set_master(&self, ip: Ipv4Addr) -> Result<(), StoreError>;
}
