use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pifleet_common::config::Config;
use pifleet_common::error::{ConnectError, ExecError};
use pifleet_common::liveness::LivenessProbe;
use pifleet_common::models::device::Device;
use pifleet_common::remote::{Connection, Credentials, ExecOutput, RemoteProbe};
use pifleet_core::fleet::Fleet;
use pifleet_core::store::MemoryStore;
use pifleet_protocols::telemetry;

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// How one simulated player behaves.
#[derive(Debug, Clone)]
pub struct FakePlayer {
    pub mac: Option<String>,
    pub ssh: bool,
    /// Every command after login times out.
    pub hangs: bool,
    /// Login works but every channel is already closed.
    pub dead_session: bool,
    /// Round trip reported when this player pings anything.
    pub rtt_ms: Option<f64>,
    pub drops_on_reboot: bool,
    /// Time every command takes before answering.
    pub exec_delay: Duration,
}

impl FakePlayer {
    pub fn new(mac: &str) -> Self {
        Self {
            mac: Some(mac.to_string()),
            ssh: true,
            hangs: false,
            dead_session: false,
            rtt_ms: Some(0.421),
            drops_on_reboot: true,
            exec_delay: Duration::ZERO,
        }
    }

    pub fn without_ssh(mut self) -> Self {
        self.ssh = false;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hangs = true;
        self
    }

    pub fn with_dead_session(mut self) -> Self {
        self.dead_session = true;
        self
    }

    pub fn without_mac(mut self) -> Self {
        self.mac = None;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    pub fn cannot_ping(mut self) -> Self {
        self.rtt_ms = None;
        self
    }
}

#[derive(Default)]
pub struct Counters {
    pub liveness: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// A LAN of players that answers liveness checks and remote commands.
#[derive(Default)]
pub struct FakeNetwork {
    players: Mutex<BTreeMap<Ipv4Addr, FakePlayer>>,
    pub counters: Arc<Counters>,
    executed: Arc<Mutex<Vec<(Ipv4Addr, String)>>>,
    checked: Mutex<Vec<Ipv4Addr>>,
    liveness_delay: Duration,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_liveness_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            liveness_delay: delay,
            ..Self::default()
        })
    }

    pub fn plug(&self, addr: &str, player: FakePlayer) {
        self.players.lock().unwrap().insert(ip(addr), player);
    }

    pub fn unplug(&self, addr: &str) {
        self.players.lock().unwrap().remove(&ip(addr));
    }

    /// Commands run on `addr` so far, in order.
    pub fn commands_on(&self, addr: &str) -> Vec<String> {
        let addr = ip(addr);
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(peer, _)| *peer == addr)
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Every address the liveness probe was asked about.
    pub fn checked(&self) -> Vec<Ipv4Addr> {
        let mut checked = self.checked.lock().unwrap().clone();
        checked.sort();
        checked
    }

    fn player(&self, addr: Ipv4Addr) -> Option<FakePlayer> {
        self.players.lock().unwrap().get(&addr).cloned()
    }
}

#[async_trait]
impl LivenessProbe for FakeNetwork {
    async fn is_alive(&self, addr: Ipv4Addr, _timeout: Duration) -> bool {
        let counters = &self.counters;
        counters.liveness.fetch_add(1, Ordering::SeqCst);
        self.checked.lock().unwrap().push(addr);

        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.liveness_delay.is_zero() {
            tokio::time::sleep(self.liveness_delay).await;
        }
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.player(addr).is_some()
    }
}

#[async_trait]
impl RemoteProbe for FakeNetwork {
    async fn open(
        &self,
        addr: Ipv4Addr,
        _credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, ConnectError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let player = match self.player(addr) {
            Some(player) if player.ssh => player,
            Some(_) => return Err(ConnectError::Timeout { addr }),
            None => {
                return Err(ConnectError::Unreachable {
                    addr,
                    detail: "no route to host".to_string(),
                })
            }
        };

        Ok(Box::new(FakeConnection {
            peer: addr,
            player,
            counters: self.counters.clone(),
            executed: self.executed.clone(),
        }))
    }
}

struct FakeConnection {
    peer: Ipv4Addr,
    player: FakePlayer,
    counters: Arc<Counters>,
    executed: Arc<Mutex<Vec<(Ipv4Addr, String)>>>,
}

fn ok(stdout: &str) -> Result<ExecOutput, ExecError> {
    Ok(ExecOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    })
}

#[async_trait]
impl Connection for FakeConnection {
    fn peer(&self) -> Ipv4Addr {
        self.peer
    }

    async fn exec(&mut self, command: &str, _timeout: Duration) -> Result<ExecOutput, ExecError> {
        self.executed
            .lock()
            .unwrap()
            .push((self.peer, command.to_string()));

        let player = &self.player;
        if !player.exec_delay.is_zero() {
            tokio::time::sleep(player.exec_delay).await;
        }
        if player.dead_session {
            return Err(ExecError::Closed);
        }
        if player.hangs {
            return Err(ExecError::Timeout);
        }

        match command {
            telemetry::MAC_ADDRESS => match &player.mac {
                Some(mac) => ok(&format!("{mac}\n")),
                None => Ok(ExecOutput {
                    stdout: String::new(),
                    stderr: "cat: /sys/class/net/eth0/address: No such file or directory".into(),
                    exit_code: 1,
                }),
            },
            telemetry::MODEL => ok("Raspberry Pi 4 Model B Rev 1.4\0"),
            telemetry::RAM => ok("3794\n"),
            telemetry::STORAGE => ok("5.2G/29G (19%)\n"),
            telemetry::TEMPERATURE => ok("temp=48.3'C\n"),
            "sudo reboot" if player.drops_on_reboot => Err(ExecError::Closed),
            ping if ping.starts_with("ping ") => match player.rtt_ms {
                Some(rtt) => ok(&format!(
                    "64 bytes from master: icmp_seq=1 ttl=64 time={rtt} ms\n"
                )),
                None => Ok(ExecOutput {
                    stdout: "1 packets transmitted, 0 received, 100% packet loss\n".into(),
                    stderr: String::new(),
                    exit_code: 1,
                }),
            },
            _ => ok(""),
        }
    }

    async fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn config() -> Config {
    Config {
        workers: 8,
        ..Config::default()
    }
}

pub fn fleet_with(network: &Arc<FakeNetwork>, config: Config) -> (Fleet, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let fleet = Fleet::new(config, store.clone(), network.clone(), network.clone());
    (fleet, store)
}

pub fn fleet(network: &Arc<FakeNetwork>) -> (Fleet, Arc<MemoryStore>) {
    fleet_with(network, config())
}

/// Observed state only; drops timestamps so two passes can be compared.
pub fn without_timestamps(mut devices: Vec<Device>) -> Vec<Device> {
    for device in &mut devices {
        device.last_connection = None;
    }
    devices
}
