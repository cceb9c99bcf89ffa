//! # Fleet Models
//!
//! * [`device::Device`]: a managed player, keyed by MAC address.
//! * [`setup::Setup`]: a named CIDR range owning devices.
//! * [`lag::LagMeasurement`]: latency to the subnet master, or why there is none.
//! * [`dispatch::PlayerCommand`] and [`dispatch::DispatchResult`]: fan-out commands and outcomes.
//! * [`scan::ScanReport`]: what one scan pass saw.

pub mod device;
pub mod dispatch;
pub mod lag;
pub mod scan;
pub mod setup;
