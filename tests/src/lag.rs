use std::sync::atomic::Ordering;

use pifleet_common::error::{FleetError, StoreError};
use pifleet_common::models::lag::{LagMeasurement, Unmeasurable};
use pifleet_common::store::Store;

use crate::support::{fleet, ip, FakeNetwork, FakePlayer};

fn players() -> std::sync::Arc<FakeNetwork> {
    let network = FakeNetwork::new();
    network.plug("10.0.0.3", FakePlayer::new("b8:27:eb:00:00:03"));
    network.plug("10.0.0.5", FakePlayer::new("b8:27:eb:00:00:05"));
    network.plug("10.0.0.9", FakePlayer::new("b8:27:eb:00:00:09"));
    network
}

#[tokio::test]
async fn no_master_means_unmeasurable() {
    let network = players();
    let (fleet, _store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    let opens_before = network.counters.opens.load(Ordering::SeqCst);

    let lag = fleet.lag(ip("10.0.0.3")).await.unwrap();

    assert_eq!(
        lag,
        LagMeasurement::Unmeasurable {
            reason: Unmeasurable::NoMaster
        }
    );
    assert_eq!(lag.to_string(), "N/A (no master configured)");
    assert_eq!(network.counters.opens.load(Ordering::SeqCst), opens_before);
}

#[tokio::test]
async fn lag_is_the_ping_round_trip_to_the_master() {
    let network = players();
    let (fleet, _store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    fleet.set_master(ip("10.0.0.9")).await.unwrap();

    let lag = fleet.lag(ip("10.0.0.3")).await.unwrap();

    let rtt = lag.as_duration().unwrap();
    assert!((rtt.as_secs_f64() * 1_000.0 - 0.421).abs() < 1e-6);
    assert_eq!(
        network.commands_on("10.0.0.3").last().unwrap(),
        "ping -c 1 -W 1 10.0.0.9"
    );
}

#[tokio::test]
async fn failed_ping_is_unreachable() {
    let network = players();
    let (fleet, _store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    fleet.set_master(ip("10.0.0.9")).await.unwrap();
    network.plug("10.0.0.3", FakePlayer::new("b8:27:eb:00:00:03").cannot_ping());

    assert_eq!(fleet.lag(ip("10.0.0.3")).await.unwrap(), LagMeasurement::unreachable());

    network.unplug("10.0.0.5");
    assert_eq!(fleet.lag(ip("10.0.0.5")).await.unwrap(), LagMeasurement::unreachable());
}

#[tokio::test]
async fn scan_records_lag_once_a_master_exists() {
    let network = players();
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    fleet.set_master(ip("10.0.0.9")).await.unwrap();
    fleet.scan("10.0.0.0/28").await.unwrap();

    let device = store.device_by_ip(ip("10.0.0.5")).await.unwrap().unwrap();
    assert!(matches!(device.lag, Some(LagMeasurement::Measured { .. })));
}

#[tokio::test]
async fn second_master_replaces_the_first() {
    let network = players();
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();

    fleet.set_master(ip("10.0.0.5")).await.unwrap();
    let master = fleet.set_master(ip("10.0.0.9")).await.unwrap();
    assert!(master.master);

    let masters: Vec<_> = store
        .all_devices()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.master)
        .map(|d| d.ip)
        .collect();
    assert_eq!(masters, vec![Some(ip("10.0.0.9"))]);
}

#[tokio::test]
async fn concurrent_master_changes_leave_exactly_one() {
    let network = players();
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();

    let (a, b, c) = tokio::join!(
        fleet.set_master(ip("10.0.0.3")),
        fleet.set_master(ip("10.0.0.5")),
        fleet.set_master(ip("10.0.0.9")),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let masters = store
        .all_devices()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.master)
        .count();
    assert_eq!(masters, 1);
}

#[tokio::test]
async fn master_moving_into_another_subnet_does_not_double_up() {
    let network = FakeNetwork::new();
    network.plug("10.0.0.5", FakePlayer::new("b8:27:eb:00:00:0a"));
    network.plug("10.0.1.9", FakePlayer::new("b8:27:eb:00:00:0b"));
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    fleet.scan("10.0.1.0/28").await.unwrap();
    fleet.set_master(ip("10.0.0.5")).await.unwrap();
    fleet.set_master(ip("10.0.1.9")).await.unwrap();

    network.unplug("10.0.0.5");
    network.plug("10.0.1.5", FakePlayer::new("b8:27:eb:00:00:0a"));
    fleet.scan("10.0.1.0/28").await.unwrap();

    let masters: Vec<_> = store
        .all_devices()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.master)
        .filter_map(|d| d.ip)
        .collect();
    assert_eq!(masters, vec![ip("10.0.1.9")]);

    fleet.lag(ip("10.0.1.5")).await.unwrap();
    assert_eq!(
        network.commands_on("10.0.1.5").last().unwrap(),
        "ping -c 1 -W 1 10.0.1.9"
    );
}

#[tokio::test]
async fn unknown_master_changes_nothing() {
    let network = players();
    let (fleet, store) = fleet(&network);
    fleet.scan("10.0.0.0/28").await.unwrap();
    fleet.set_master(ip("10.0.0.5")).await.unwrap();

    let err = fleet.set_master(ip("10.0.0.77")).await.unwrap_err();

    assert_eq!(err, FleetError::Store(StoreError::NotFound("10.0.0.77".into())));
    let master = store.device_by_ip(ip("10.0.0.5")).await.unwrap().unwrap();
    assert!(master.master);
}

#[tokio::test]
async fn metrics_reads_a_player_on_demand() {
    let network = players();
    let (fleet, store) = fleet(&network);

    let info = fleet.metrics(ip("10.0.0.3")).await.unwrap();

    assert_eq!(info.mac.unwrap().to_string(), "b8:27:eb:00:00:03");
    assert_eq!(info.lag, LagMeasurement::no_master());
    assert!(store.all_devices().await.unwrap().is_empty());

    let err = fleet.metrics(ip("10.0.0.11")).await.unwrap_err();
    assert!(matches!(err, FleetError::Connect(_)));
}
