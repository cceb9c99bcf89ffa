use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pifleet_common::error::{ConfigError, FleetError};
use pifleet_common::models::device::{Device, Reading, Telemetry};
use pifleet_common::models::dispatch::DispatchMode;

use crate::support::{fleet, ip, FakeNetwork, FakePlayer};

async fn three_players() -> (Arc<FakeNetwork>, pifleet_core::fleet::Fleet) {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new("b8:27:eb:00:00:03"));
    network.plug("10.0.0.4", FakePlayer::new("b8:27:eb:00:00:04"));
    network.plug("10.0.0.5", FakePlayer::new("b8:27:eb:00:00:05"));
    let (fleet, _store) = fleet(&network);
    fleet.scan("10.0.0.0/29").await.unwrap();
    (network, fleet)
}

#[tokio::test]
async fn one_result_per_player_even_when_one_hangs() {
    let (network, fleet) = three_players().await;
    network.plug("10.0.0.4", FakePlayer::new("b8:27:eb:00:00:04").hanging());

    let results = fleet
        .dispatch_all("10.0.0.0/29", "pause", DispatchMode::Wait)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].device.ip, Some(ip("10.0.0.4")));
    assert_eq!(failed[0].detail.as_deref(), Some("command timed out"));
    assert!(results.iter().all(|r| r.command == "pause"));
}

#[tokio::test]
async fn one_result_per_player_when_one_cannot_connect() {
    let (network, fleet) = three_players().await;
    network.plug("10.0.0.5", FakePlayer::new("b8:27:eb:00:00:05").without_ssh());

    let results = fleet
        .dispatch_all("10.0.0.0/29", "mute", DispatchMode::Wait)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let (ok, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.success);
    assert_eq!(ok.len(), 2);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].device.ip, Some(ip("10.0.0.5")));
    assert_eq!(failed[0].detail.as_deref(), Some("timed out connecting to 10.0.0.5"));
    assert!(network.commands_on("10.0.0.3").last().unwrap().contains("amixer"));
    assert!(network.commands_on("10.0.0.4").last().unwrap().contains("amixer"));
}

#[tokio::test]
async fn players_are_commanded_side_by_side() {
    let (network, fleet) = three_players().await;
    let delay = Duration::from_millis(300);
    for (addr, mac) in [
        ("10.0.0.3", "b8:27:eb:00:00:03"),
        ("10.0.0.4", "b8:27:eb:00:00:04"),
        ("10.0.0.5", "b8:27:eb:00:00:05"),
    ] {
        network.plug(addr, FakePlayer::new(mac).slow(delay));
    }

    let started = Instant::now();
    let results = fleet
        .dispatch_all("10.0.0.0/29", "pause", DispatchMode::Wait)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "took {elapsed:?}");
}

#[tokio::test]
async fn unreachable_player_yields_a_failed_result() {
    let network = FakeNetwork::new();
    let (fleet, _store) = fleet(&network);

    let result = fleet
        .dispatch(ip("10.0.0.5"), "show-message:Hello")
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.device.ip, Some(ip("10.0.0.5")));
    assert!(result.detail.unwrap().contains("unreachable"));
}

#[tokio::test]
async fn malformed_commands_never_reach_the_network() {
    let (network, fleet) = three_players().await;
    let opens_before = network.counters.opens.load(Ordering::SeqCst);

    let err = fleet.dispatch(ip("10.0.0.3"), "dance").await.unwrap_err();
    assert_eq!(err, FleetError::Config(ConfigError::UnknownCommand("dance".into())));

    let err = fleet
        .dispatch_all("10.0.0.0/29", "show-message:  ", DispatchMode::Wait)
        .await
        .unwrap_err();
    assert_eq!(err, FleetError::Config(ConfigError::EmptyMessage));

    assert_eq!(network.counters.opens.load(Ordering::SeqCst), opens_before);
}

#[tokio::test]
async fn reboot_counts_a_dropped_session_as_success() {
    let (_network, fleet) = three_players().await;

    let result = fleet.dispatch(ip("10.0.0.3"), "reboot").await.unwrap();

    assert!(result.success);
    assert_eq!(result.device.name.as_deref(), Some("Device_10_0_0_3"));
}

#[tokio::test]
async fn show_message_stops_the_current_player_first() {
    let (network, fleet) = three_players().await;

    let result = fleet
        .dispatch(ip("10.0.0.3"), "show-message:Doors close in 5 minutes")
        .await
        .unwrap();

    assert!(result.success);
    let sent = network.commands_on("10.0.0.3");
    let script = sent.last().unwrap();
    assert!(script.starts_with("pkill omxplayer"));
    assert!(script.contains("Doors close in 5 minutes"));
}

#[tokio::test]
async fn player_without_address_fails_on_its_own() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new("b8:27:eb:00:00:03"));
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/29").await.unwrap();
    store
        .insert(Device {
            mac: "b8:27:eb:00:00:99".parse().unwrap(),
            name: "Spare".into(),
            ip: None,
            iprange: "10.0.0.0/29".into(),
            model: Reading::Unknown,
            telemetry: Telemetry::default(),
            lag: None,
            master: false,
            sort: 0,
            missing: true,
            missed_scans: 3,
            last_connection: Some(Utc::now()),
        })
        .await;

    let results = fleet
        .dispatch_all("10.0.0.0/29", "mute", DispatchMode::Wait)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let spare = results.iter().find(|r| r.device.ip.is_none()).unwrap();
    assert!(!spare.success);
    assert_eq!(spare.detail.as_deref(), Some("device has no known address"));
}

#[tokio::test]
async fn detached_dispatch_reports_sent_and_runs_in_background() {
    let (network, fleet) = three_players().await;

    let results = fleet
        .dispatch_all("10.0.0.0/29", "unmute", DispatchMode::Detached)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|r| r.success && r.detail.as_deref() == Some("sent")));

    fleet.settle().await;
    let script = network.commands_on("10.0.0.5").last().cloned().unwrap();
    assert!(script.starts_with("nohup sh -c"));
    assert!(script.contains("amixer -q set Master unmute"));
}

#[tokio::test]
async fn unknown_range_is_a_config_error() {
    let (_network, fleet) = three_players().await;

    let err = fleet
        .dispatch_all("backstage", "pause", DispatchMode::Wait)
        .await
        .unwrap_err();

    assert_eq!(err, FleetError::Config(ConfigError::UnknownRange("backstage".into())));
}
