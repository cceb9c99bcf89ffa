//! What gets sent to a player over a remote session, and how its answers are read.
//!
//! * [`telemetry`]: read-only commands for the device probe, with output parsers.
//! * [`ping`]: the lag measurement command run on a device, and its round-trip parser.
//! * [`player`]: shell scripts behind each [`PlayerCommand`](pifleet_common::models::dispatch::PlayerCommand).

pub mod ping;
pub mod player;
pub mod telemetry;
