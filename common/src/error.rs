//! # Error Taxonomy
//!
//! Failures are split by how far they are allowed to travel:
//!
//! * [`ConnectError`] and [`ExecError`] stay inside one host or one device. Batch operations
//!   record them and carry on.
//! * [`ConfigError`] is raised before any network activity and aborts the whole call.
//! * [`StoreError`] comes from the record store collaborator.
//!
//! [`FleetError`] is what the public fleet operations return.

use std::net::Ipv4Addr;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Opening a session to a device failed. The device is treated as offline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("{addr} is unreachable: {detail}")]
    Unreachable { addr: Ipv4Addr, detail: String },

    #[error("timed out connecting to {addr}")]
    Timeout { addr: Ipv4Addr },

    #[error("session setup with {addr} failed: {detail}")]
    Handshake { addr: Ipv4Addr, detail: String },

    #[error("{addr} rejected credentials for user '{user}'")]
    Auth { addr: Ipv4Addr, user: String },
}

/// A command could not be run to completion on an open connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("failed to open channel: {0}")]
    Channel(String),

    #[error("command timed out")]
    Timeout,

    #[error("connection closed mid-command")]
    Closed,

    #[error("{0}")]
    Failed(String),
}

impl ExecError {
    /// True when the session itself is gone, as opposed to one command misbehaving.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Malformed input. Rejected before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid CIDR '{input}': {detail}")]
    InvalidCidr { input: String, detail: String },

    #[error("range {0} is too large to scan (prefix must be /16 or longer)")]
    RangeTooLarge(String),

    #[error("unknown range or setup '{0}'")]
    UnknownRange(String),

    #[error("unknown command '{0}' (expected pause, mute, unmute, reboot or show-message:<text>)")]
    UnknownCommand(String),

    #[error("show-message needs a non-empty text")]
    EmptyMessage,

    #[error("invalid MAC address {0}")]
    InvalidMac(String),

    #[error("failed to load configuration: {0}")]
    Load(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no record for {0}")]
    NotFound(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// The connection handed to the device probe could not execute anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connection to {addr} cannot execute commands: {source}")]
    Unusable { addr: Ipv4Addr, source: ExecError },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl FleetError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Store(_) => "store",
            Self::Connect(_) => "connect",
            Self::Probe(_) => "probe",
        }
    }
}

impl Serialize for FleetError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FleetError", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
