//! Integration tests for status refresh, sampling and the periodic runner.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use hashctl_control::{run_periodic, CycleTask, DeviceStatus, RecordStore};
use hashctl_driver::scripted::ScriptedDevice;
use hashctl_driver::ScriptedDriver;
use tokio::sync::Notify;

use common::*;

#[tokio::test]
async fn sample_carries_interval_price_and_telemetry() {
    let schedule = night_and_day(None);
    let night_id = schedule.intervals()[0].id;
    let device = scheduled_device("a1", "10.0.0.1", schedule);
    let device_id = device.id;
    let h = harness(
        ScriptedDriver::new().with_device(
            "10.0.0.1",
            ScriptedDevice {
                env_temp: Some(4.0),
                ..ScriptedDevice::hashing()
            },
        ),
        vec![device],
    );

    let report = h.controller.sample_all(at(23, 0)).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let samples = h.store.samples(device_id).await;
    assert_eq!(samples.len(), 1);
    let s = &samples[0];
    assert_eq!(s.price_per_kwh, 0.08);
    assert_eq!(s.interval_id, Some(night_id));
    assert_eq!(s.interval_secs, 60);
    assert_eq!(s.power, 3000);
    assert_eq!(s.env_temp, Some(4.0));
    assert!(s.is_online && s.is_hashing && s.is_stable);

    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Hashing);
    assert_eq!(stored.updated_at, Some(at(23, 0)));
    assert_eq!(stored.power_limit, Some(3000));
}

#[tokio::test]
async fn unscheduled_sample_has_zero_price() {
    let device = hashctl_control::Device::new("a1", "10.0.0.1");
    let device_id = device.id;
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );

    h.controller.sample_all(at(12, 0)).await.unwrap();
    let samples = h.store.samples(device_id).await;
    assert_eq!(samples[0].price_per_kwh, 0.0);
    assert_eq!(samples[0].interval_id, None);
}

#[tokio::test]
async fn unreachable_device_records_offline_sample() {
    let device = hashing(scheduled_device("a1", "10.0.0.1", night_and_day(None)), 3000);
    let device_id = device.id;
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::offline()),
        vec![device],
    );

    let report = h.controller.sample_all(at(12, 0)).await.unwrap();
    assert_eq!(report.failed, 0);

    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Offline);
    assert_eq!(stored.changed_at, Some(at(12, 0)));

    let samples = h.store.samples(device_id).await;
    assert!(!samples[0].is_online);
    assert_eq!(samples[0].power, 0);
    assert_eq!(samples[0].hashrate_ths, 0.0);
}

#[tokio::test]
async fn faulted_device_reports_error_status() {
    let device = paused(scheduled_device("a1", "10.0.0.1", night_and_day(None)));
    let h = harness(
        ScriptedDriver::new().with_device(
            "10.0.0.1",
            ScriptedDevice {
                fault: Some("hashboard 2 missing".into()),
                ..ScriptedDevice::paused()
            },
        ),
        vec![device],
    );

    h.controller.sample_all(at(12, 0)).await.unwrap();
    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Error);
}

#[tokio::test]
async fn changed_at_only_moves_on_status_change() {
    let device = scheduled_device("a1", "10.0.0.1", night_and_day(None));
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );

    h.controller.sample_all(at(12, 0)).await.unwrap();
    h.controller.sample_all(at(12, 1)).await.unwrap();
    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Paused);
    assert_eq!(stored.changed_at, Some(at(12, 0)));
    assert_eq!(stored.updated_at, Some(at(12, 1)));

    h.driver.update("10.0.0.1", |d| {
        d.mining = true;
        d.stable = false;
    });
    h.controller.sample_all(at(12, 2)).await.unwrap();
    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Transitioning);
    assert_eq!(stored.changed_at, Some(at(12, 2)));
}

#[tokio::test]
async fn failed_commit_is_isolated() {
    let a1 = scheduled_device("a1", "10.0.0.1", night_and_day(None));
    let b2 = scheduled_device("b2", "10.0.0.2", night_and_day(None));
    let (a1_id, b2_id) = (a1.id, b2.id);
    let h = harness(
        ScriptedDriver::new()
            .with_device("10.0.0.1", ScriptedDevice::hashing())
            .with_device("10.0.0.2", ScriptedDevice::hashing()),
        vec![a1, b2],
    );
    h.store.fail_commits_for(a1_id).await;

    let report = h.controller.sample_all(at(12, 0)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(h.store.samples(a1_id).await.is_empty());
    assert_eq!(h.store.samples(b2_id).await.len(), 1);
    assert_eq!(h.store.device_by_name("a1").await.unwrap().status(), DeviceStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn periodic_runner_stops_on_shutdown() {
    let device = scheduled_device("a1", "10.0.0.1", night_and_day(None));
    let device_id = device.id;
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );
    let store = h.store.clone();
    let controller = Arc::new(h.controller);
    let shutdown = Arc::new(Notify::new());

    let runner = tokio::spawn(run_periodic(
        controller,
        CycleTask::Sample,
        StdDuration::from_secs(60),
        shutdown.clone(),
    ));

    // The first tick fires immediately, then one every minute.
    tokio::time::sleep(StdDuration::from_secs(150)).await;
    shutdown.notify_waiters();
    let cycles = runner.await.unwrap();

    assert_eq!(cycles, 3);
    assert_eq!(store.samples(device_id).await.len(), 3);
}
