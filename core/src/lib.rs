//! # Fleet Core
//!
//! Application services for discovering players and sending them commands, plus the
//! adapters that connect them to the outside world (SSH, ICMP/TCP liveness, SQLite).
//!
//! The services depend only on the capability traits in `pifleet-common`; [`fleet::Fleet`]
//! wires them together.

pub mod dispatch;
pub mod fleet;
pub mod lag;
pub mod network;
pub mod probe;
pub mod ranges;
pub mod remote;
pub mod scanner;
pub mod store;
