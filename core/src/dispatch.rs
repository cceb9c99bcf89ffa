//! # Fleet Dispatcher
//!
//! Sends one player command to one device, or to every device of a range at once.
//! Each device gets its own task and its own session; a failing device only fails its
//! own result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use pifleet_common::config::Config;
use pifleet_common::error::ExecError;
use pifleet_common::models::device::{Device, DeviceRef};
use pifleet_common::models::dispatch::{DispatchMode, DispatchResult, PlayerCommand};
use pifleet_common::remote::{Credentials, RemoteProbe};
use pifleet_protocols::player;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub exec_timeout: Duration,
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            credentials: config.credentials.clone(),
            connect_timeout: config.connect_timeout(),
            exec_timeout: config.exec_timeout(),
        }
    }
}

pub struct FleetDispatcher {
    sender: Arc<Sender>,
    detached: Mutex<JoinSet<()>>,
}

/// Delivers a command to a single device.
struct Sender {
    remote: Arc<dyn RemoteProbe>,
    settings: DispatchSettings,
}

impl FleetDispatcher {
    pub fn new(remote: Arc<dyn RemoteProbe>, settings: DispatchSettings) -> Self {
        Self {
            sender: Arc::new(Sender { remote, settings }),
            detached: Mutex::new(JoinSet::new()),
        }
    }

    pub async fn dispatch(&self, target: DeviceRef, command: &PlayerCommand) -> DispatchResult {
        let result = self
            .sender
            .send(target, command, DispatchMode::Wait)
            .await;
        log_result(&result);
        result
    }

    /// One result per device, in the order given.
    ///
    /// In detached mode the tasks keep running after this returns; their real outcome is
    /// only logged. [`settle`](Self::settle) waits for them.
    pub async fn dispatch_all(
        &self,
        devices: &[Device],
        command: &PlayerCommand,
        mode: DispatchMode,
    ) -> Vec<DispatchResult> {
        info!("Sending '{command}' to {} devices", devices.len());

        match mode {
            DispatchMode::Wait => self.fan_out(devices, command).await,
            DispatchMode::Detached => {
                let mut background = self.detached.lock().await;
                reap(&mut background);
                devices
                    .iter()
                    .map(|device| {
                        let target = DeviceRef::from(device);
                        let sender = self.sender.clone();
                        let owned = command.clone();
                        let task_target = target.clone();
                        background.spawn(async move {
                            let result = sender
                                .send(task_target, &owned, DispatchMode::Detached)
                                .await;
                            log_result(&result);
                        });
                        DispatchResult::succeeded(target, command, Some("sent".into()))
                    })
                    .collect()
            }
        }
    }

    /// Waits for every detached dispatch still in flight.
    pub async fn settle(&self) {
        let mut background = self.detached.lock().await;
        if !background.is_empty() {
            debug!("Waiting for {} detached dispatches", background.len());
        }
        while let Some(joined) = background.join_next().await {
            report_detached(joined);
        }
    }

    #[cfg(test)]
    async fn in_flight(&self) -> usize {
        self.detached.lock().await.len()
    }

    async fn fan_out(&self, devices: &[Device], command: &PlayerCommand) -> Vec<DispatchResult> {
        let handles: Vec<(DeviceRef, JoinHandle<DispatchResult>)> = devices
            .iter()
            .map(|device| {
                let target = DeviceRef::from(device);
                let sender = self.sender.clone();
                let command = command.clone();
                let task_target = target.clone();
                let handle = tokio::spawn(async move {
                    sender.send(task_target, &command, DispatchMode::Wait).await
                });
                (target, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => DispatchResult::failed(target, command, format!("task failed: {e}")),
            };
            log_result(&result);
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            "'{command}' done: {} succeeded, {failed} failed",
            results.len() - failed
        );
        results
    }
}

/// Drops detached tasks that already finished so the set only holds live ones.
fn reap(background: &mut JoinSet<()>) {
    while let Some(joined) = background.try_join_next() {
        report_detached(joined);
    }
}

fn report_detached(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("Detached dispatch task died: {e}");
    }
}

fn log_result(result: &DispatchResult) {
    let detail = result.detail.as_deref().unwrap_or("");
    if result.success {
        debug!("{} on {}: ok {detail}", result.command, result.device);
    } else {
        warn!("{} on {} failed: {detail}", result.command, result.device);
    }
}

impl Sender {
    async fn send(
        &self,
        target: DeviceRef,
        command: &PlayerCommand,
        mode: DispatchMode,
    ) -> DispatchResult {
        let Some(ip) = target.ip else {
            return DispatchResult::failed(target, command, "device has no known address");
        };
        let settings = &self.settings;

        let mut conn = match self
            .remote
            .open(ip, &settings.credentials, settings.connect_timeout)
            .await
        {
            Ok(conn) => conn,
            Err(e) => return DispatchResult::failed(target, command, e.to_string()),
        };

        let script = player::invocation(command, mode);
        let executed = conn.exec(&script, settings.exec_timeout).await;
        conn.close().await;

        match executed {
            Ok(out) if out.success() => {
                let note = match mode {
                    DispatchMode::Wait => None,
                    DispatchMode::Detached => Some("sent".to_string()),
                };
                DispatchResult::succeeded(target, command, note).with_output(&out.stdout)
            }
            Ok(out) => DispatchResult::failed(target, command, out.failure_detail())
                .with_output(&out.stdout),
            Err(ExecError::Closed) if *command == PlayerCommand::Reboot => {
                DispatchResult::succeeded(
                    target,
                    command,
                    Some("connection dropped while rebooting".to_string()),
                )
            }
            Err(e) => DispatchResult::failed(target, command, e.to_string()),
        }
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
