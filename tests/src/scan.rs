use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pifleet_common::config::Config;
use pifleet_common::error::{ConfigError, FleetError};
use pifleet_common::models::device::Reading;
use pifleet_common::network::mac::MacAddress;
use pifleet_common::store::Store;

use crate::support::{config, fleet, fleet_with, ip, without_timestamps, FakeNetwork, FakePlayer};

const MAC_A: &str = "b8:27:eb:00:00:03";
const MAC_B: &str = "b8:27:eb:00:00:04";

fn mac(s: &str) -> MacAddress {
    s.parse().unwrap()
}

#[tokio::test]
async fn small_block_skips_reserved_octets_and_finds_the_live_player() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    let (fleet, store) = fleet(&network);

    let report = fleet.scan("10.0.0.0/29").await.unwrap();

    assert_eq!(
        network.checked(),
        vec![ip("10.0.0.2"), ip("10.0.0.3"), ip("10.0.0.4"), ip("10.0.0.5"), ip("10.0.0.6")]
    );
    assert_eq!(report.probed, 5);
    assert_eq!(report.alive, 1);
    assert_eq!(report.reconciled, vec![mac(MAC_A)]);

    let devices = store.all_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.ip, Some(ip("10.0.0.3")));
    assert_eq!(device.mac, mac(MAC_A));
    assert_eq!(device.iprange, "10.0.0.0/29");
    assert!(!device.missing);
    assert_eq!(device.model, Reading::Value("Raspberry Pi 4 Model B Rev 1.4".into()));
    assert_eq!(device.telemetry.ram, Reading::Value("3794 MB".into()));
}

#[tokio::test]
async fn scanning_twice_changes_nothing_but_timestamps() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    network.plug("10.0.0.4", FakePlayer::new(MAC_B));
    let (fleet, store) = fleet(&network);

    fleet.scan("10.0.0.0/29").await.unwrap();
    let first = without_timestamps(store.all_devices().await.unwrap());
    fleet.scan("10.0.0.0/29").await.unwrap();
    let second = without_timestamps(store.all_devices().await.unwrap());

    assert_eq!(first, second);
    assert_eq!(store.setups().await.unwrap().len(), 1);
}

#[tokio::test]
async fn absent_player_is_flagged_and_cleared_when_it_returns() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    network.plug("10.0.0.4", FakePlayer::new(MAC_B));
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/29").await.unwrap();

    network.unplug("10.0.0.4");
    let report = fleet.scan("10.0.0.0/29").await.unwrap();
    assert_eq!(report.absent, vec![mac(MAC_B)]);
    assert_eq!(report.flagged_missing, vec![mac(MAC_B)]);

    let gone = store.device_by_ip(ip("10.0.0.4")).await.unwrap().unwrap();
    assert!(gone.missing);
    let present = store.device_by_ip(ip("10.0.0.3")).await.unwrap().unwrap();
    assert!(!present.missing);

    network.plug("10.0.0.4", FakePlayer::new(MAC_B));
    fleet.scan("10.0.0.0/29").await.unwrap();
    let back = store.device_by_ip(ip("10.0.0.4")).await.unwrap().unwrap();
    assert!(!back.missing);
    assert_eq!(back.missed_scans, 0);
}

#[tokio::test]
async fn missing_after_two_needs_two_absent_scans() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    let (fleet, store) = fleet_with(
        &network,
        Config {
            missing_after: 2,
            ..config()
        },
    );
    fleet.scan("10.0.0.0/29").await.unwrap();
    network.unplug("10.0.0.3");

    fleet.scan("10.0.0.0/29").await.unwrap();
    let device = &store.all_devices().await.unwrap()[0];
    assert!(!device.missing);
    assert_eq!(device.missed_scans, 1);

    fleet.scan("10.0.0.0/29").await.unwrap();
    assert!(store.all_devices().await.unwrap()[0].missing);
}

#[tokio::test]
async fn bad_ranges_are_rejected_before_any_probe() {
    let network = FakeNetwork::new();
    let (fleet, _store) = fleet(&network);

    let err = fleet.scan("10.0.0.0/33").await.unwrap_err();
    assert!(matches!(err, FleetError::Config(ConfigError::InvalidCidr { .. })));

    let err = fleet.scan("10.0.0.0/8").await.unwrap_err();
    assert!(matches!(err, FleetError::Config(ConfigError::RangeTooLarge(_))));

    let err = fleet.scan("lobby").await.unwrap_err();
    assert!(matches!(err, FleetError::Config(ConfigError::UnknownRange(_))));

    assert_eq!(network.counters.liveness.load(Ordering::SeqCst), 0);
    assert_eq!(network.counters.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn worker_pool_never_exceeds_its_width() {
    let network = FakeNetwork::with_liveness_delay(Duration::from_millis(5));
    let (fleet, _store) = fleet_with(
        &network,
        Config {
            workers: 4,
            ..config()
        },
    );

    let report = fleet.scan("10.0.1.0/26").await.unwrap();

    assert_eq!(report.probed, 61);
    assert_eq!(network.counters.liveness.load(Ordering::SeqCst), 61);
    let peak = network.counters.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 4, "{peak} hosts were probed at once");
    assert!(peak >= 1);
}

#[tokio::test]
async fn unusable_hosts_are_skipped_without_failing_the_pass() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.2", FakePlayer::new("b8:27:eb:00:00:02").without_ssh());
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    network.plug("10.0.0.4", FakePlayer::new(MAC_B).with_dead_session());
    network.plug("10.0.0.5", FakePlayer::new("b8:27:eb:00:00:05").without_mac());
    let (fleet, store) = fleet(&network);

    let report = fleet.scan("10.0.0.0/29").await.unwrap();

    assert_eq!(report.alive, 4);
    assert_eq!(report.reconciled, vec![mac(MAC_A)]);
    assert_eq!(store.all_devices().await.unwrap().len(), 1);
    assert_eq!(
        network.counters.opens.load(Ordering::SeqCst),
        network.counters.closes.load(Ordering::SeqCst) + 1,
        "every opened session except the refused one is closed"
    );
}

#[tokio::test]
async fn progress_is_reported_for_every_host() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let (fleet, _store) = fleet(&network);
    let fleet = fleet.on_scan_progress(Arc::new(move |progress| {
        assert_eq!(progress.total, 5);
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    fleet.scan("10.0.0.0/29").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn setup_name_can_stand_in_for_the_range() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new(MAC_A));
    let (fleet, store) = fleet(&network);
    fleet.register_setup("Front Window", "10.0.0.0/29").await.unwrap();

    let report = fleet.scan("front-window").await.unwrap();

    assert_eq!(report.range, "10.0.0.0/29");
    assert_eq!(store.setups().await.unwrap()[0].name, "Front Window");
    assert_eq!(fleet.devices(Some("Front Window")).await.unwrap().len(), 1);
}
