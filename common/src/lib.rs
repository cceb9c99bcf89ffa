//! Shared vocabulary of the fleet manager: models, errors, configuration, and the
//! capability traits the core drives ([`remote::RemoteProbe`], [`liveness::LivenessProbe`],
//! [`store::Store`]).

pub mod config;
pub mod error;
pub mod liveness;
pub mod models;
pub mod network;
pub mod remote;
pub mod store;
