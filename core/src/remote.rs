//! Adapters for the [`RemoteProbe`](pifleet_common::remote::RemoteProbe) capability.

mod ssh;

pub use ssh::{SshConnection, SshProbe};
