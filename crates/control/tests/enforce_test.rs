//! Integration tests for the schedule enforcement pass.

mod common;

use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use hashctl_control::{
    ControlAction, Device, DeviceOutcome, DeviceStatus, PerformanceSample, RecordStore, UnitOfWork,
};
use hashctl_driver::scripted::{Call, ScriptedDevice};
use hashctl_driver::{ScriptedDriver, Telemetry};
use hashctl_schedule::{Interval, OverrideRequest, PerformanceLimit, Schedule};

use common::*;

// ── Schedule following ──────────────────────────────────────────

#[tokio::test]
async fn night_interval_starts_hashing_on_paused_device() {
    let device = paused(scheduled_device("a1", "10.0.0.1", night_and_day(None)));
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );

    let report = h.controller.enforce_all(at(23, 0)).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.changed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(h.driver.commands(), vec![Call::SetHashing("10.0.0.1".into(), true)]);

    let stored = h.store.device_by_name("a1").await.unwrap();
    assert!(stored.is_hashing);
    assert_eq!(stored.status(), DeviceStatus::Hashing);
    assert_eq!(stored.changed_at, Some(at(23, 0)));
}

#[tokio::test]
async fn day_interval_stops_hashing() {
    let device = hashing(scheduled_device("a1", "10.0.0.1", night_and_day(None)), 3000);
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::hashing()),
        vec![device],
    );

    let report = h.controller.enforce_all(at(12, 0)).await.unwrap();
    assert_eq!(report.changed, 1);
    assert_eq!(h.driver.commands(), vec![Call::SetHashing("10.0.0.1".into(), false)]);
    let stored = h.store.device_by_name("a1").await.unwrap();
    assert_eq!(stored.status(), DeviceStatus::Paused);
}

#[tokio::test]
async fn second_pass_issues_no_commands() {
    let device = paused(scheduled_device("a1", "10.0.0.1", night_and_day(Some(2500))));
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );

    h.controller.enforce_all(at(23, 0)).await.unwrap();
    assert_eq!(
        h.driver.commands(),
        vec![
            Call::SetHashing("10.0.0.1".into(), true),
            Call::SetPowerLimit("10.0.0.1".into(), 2500),
        ]
    );

    h.driver.clear_calls();
    let report = h.controller.enforce_all(at(23, 1)).await.unwrap();
    assert_eq!(report.changed, 0);
    assert!(h.driver.commands().is_empty());
}

#[tokio::test]
async fn unscheduled_device_keeps_its_state() {
    let device = hashing(Device::new("a1", "10.0.0.1"), 3000);
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::hashing()),
        vec![device.clone()],
    );

    let outcome = h.controller.enforce_device("a1", at(12, 0)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Unchanged);
    assert!(h.driver.calls().is_empty());
}

#[tokio::test]
async fn offline_device_is_skipped() {
    let device = scheduled_device("a1", "10.0.0.1", night_and_day(None));
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device],
    );

    let report = h.controller.enforce_all(at(23, 0)).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(h.driver.calls().is_empty());
}

// ── Debounce ────────────────────────────────────────────────────

#[tokio::test]
async fn transitioning_device_is_debounced() {
    let mut device = scheduled_device("a1", "10.0.0.1", night_and_day(None));
    device.is_online = true;
    device.is_hashing = true;
    device.is_stable = false;
    device.changed_at = Some(at(12, 0) - Duration::minutes(10));
    let h = harness(
        ScriptedDriver::new().with_device(
            "10.0.0.1",
            ScriptedDevice {
                mining: true,
                ramps_up: true,
                ..Default::default()
            },
        ),
        vec![device.clone()],
    );

    let outcome = h.controller.enforce_device("a1", at(12, 0)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Debounced);
    assert!(h.driver.commands().is_empty());

    // Once the window has passed the change goes through.
    let outcome = h.controller.enforce_device("a1", at(12, 21)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Changed(vec![ControlAction::SetHashing(false)]));
}

// ── Power limits ────────────────────────────────────────────────

#[tokio::test]
async fn power_limit_read_from_device_when_unknown() {
    let mut device = hashing(scheduled_device("a1", "10.0.0.1", night_and_day(Some(2500))), 0);
    device.power_limit = None;
    let h = harness(
        ScriptedDriver::new().with_device(
            "10.0.0.1",
            ScriptedDevice {
                power_limit: 2500,
                ..ScriptedDevice::hashing()
            },
        ),
        vec![device.clone()],
    );

    let outcome = h.controller.enforce_device("a1", at(23, 0)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Unchanged);
    assert_eq!(h.driver.calls(), vec![Call::FetchTelemetry("10.0.0.1".into())]);
}

#[tokio::test]
async fn power_limit_falls_back_to_latest_sample() {
    let mut device = hashing(scheduled_device("a1", "10.0.0.1", night_and_day(Some(2500))), 0);
    device.power_limit = None;
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::hashing()),
        vec![device.clone()],
    );

    let telemetry = Telemetry {
        wattage: 2500,
        wattage_limit: Some(2500),
        hashrate_ths: 90.0,
        is_mining: true,
        ..Default::default()
    };
    let mut work = UnitOfWork::new(device.id);
    work.append_sample(PerformanceSample::from_telemetry(&device, &telemetry, at(22, 59), 60, 0.08, None));
    h.store.commit(work).await.unwrap();

    let outcome = h.controller.enforce_device("a1", at(23, 0)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Unchanged);
    assert!(h.driver.calls().is_empty());
}

#[tokio::test]
async fn paused_schedule_leaves_power_limit_alone() {
    let mut schedule = night_and_day(None);
    schedule.push(
        Interval::daily("06:00", "22:00", false)
            .unwrap()
            .named("limited-day")
            .with_order(0)
            .with_limit(PerformanceLimit::with_power_limit(1200)),
    );
    let device = paused(scheduled_device("a1", "10.0.0.1", schedule));
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::paused()),
        vec![device.clone()],
    );

    let outcome = h.controller.enforce_device("a1", at(12, 0)).await.unwrap();
    assert_eq!(outcome, DeviceOutcome::Unchanged);
    assert!(h.driver.commands().is_empty());
}

// ── Energy budgets ──────────────────────────────────────────────

#[tokio::test]
async fn exhausted_daily_budget_stops_scheduled_hashing() {
    let budgeted = Interval::daily("00:00", "00:00", true)
        .unwrap()
        .named("budgeted")
        .with_limit(PerformanceLimit {
            power_limit: None,
            daily_power_budget: Some(5),
            ..PerformanceLimit::with_power_limit(0)
        });
    let schedule = Schedule::new(None, chrono_tz::Tz::UTC, vec![budgeted]);
    let device = hashing(scheduled_device("a1", "10.0.0.1", schedule), 3000);
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::hashing()),
        vec![device.clone()],
    );

    // One hour at 3 kW: still within budget.
    let hour = Telemetry {
        wattage: 3000,
        hashrate_ths: 100.0,
        is_mining: true,
        ..Default::default()
    };
    let mut work = UnitOfWork::new(device.id);
    work.append_sample(PerformanceSample::from_telemetry(&device, &hour, at(9, 0), 3600, 0.1, None));
    h.store.commit(work).await.unwrap();
    assert_eq!(
        h.controller.enforce_device("a1", at(12, 0)).await.unwrap(),
        DeviceOutcome::Unchanged
    );

    // A second hour takes it over 5 kWh.
    let mut work = UnitOfWork::new(device.id);
    work.append_sample(PerformanceSample::from_telemetry(&device, &hour, at(10, 0), 3600, 0.1, None));
    h.store.commit(work).await.unwrap();
    assert_eq!(
        h.controller.enforce_device("a1", at(12, 0)).await.unwrap(),
        DeviceOutcome::Changed(vec![ControlAction::SetHashing(false)])
    );
}

// ── Overrides ───────────────────────────────────────────────────

#[tokio::test]
async fn override_takes_precedence_until_it_expires() {
    let device = hashing(scheduled_device("a1", "10.0.0.1", night_and_day(None)), 3000);
    let h = harness(
        ScriptedDriver::new().with_device("10.0.0.1", ScriptedDevice::hashing()),
        vec![device],
    );

    let request = OverrideRequest {
        hashing: Some(false),
        hours: Some(3),
        ..Default::default()
    };
    h.controller.create_override("a1", &request, at(23, 0)).await.unwrap();

    h.controller.enforce_all(at(23, 30)).await.unwrap();
    assert_eq!(h.driver.commands(), vec![Call::SetHashing("10.0.0.1".into(), false)]);

    h.driver.clear_calls();
    let after = Utc.with_ymd_and_hms(2025, 1, 16, 2, 30, 0).unwrap();
    h.controller.enforce_all(after).await.unwrap();
    assert_eq!(h.driver.commands(), vec![Call::SetHashing("10.0.0.1".into(), true)]);
}

// ── Failure isolation ───────────────────────────────────────────

#[tokio::test]
async fn failing_devices_do_not_stop_the_fleet() {
    let a1 = paused(scheduled_device("a1", "10.0.0.1", night_and_day(None)));
    let b2 = paused(scheduled_device("b2", "10.0.0.2", night_and_day(None)));
    let c3 = paused(scheduled_device("c3", "10.0.0.3", night_and_day(None)));
    let c3_id = c3.id;

    let h = harness(
        ScriptedDriver::new()
            .with_device("10.0.0.1", ScriptedDevice::offline())
            .with_device("10.0.0.2", ScriptedDevice::paused())
            .with_device("10.0.0.3", ScriptedDevice::paused()),
        vec![a1, b2, c3],
    );
    h.store.fail_commits_for(c3_id).await;

    let report = h.controller.enforce_all(at(23, 0)).await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.changed, 1);
    assert_eq!(report.failed, 2);

    // The failed passes left their stored state untouched.
    let a1 = h.store.device_by_name("a1").await.unwrap();
    assert!(a1.is_online);
    assert!(!a1.is_hashing);
    let c3 = h.store.device_by_name("c3").await.unwrap();
    assert!(!c3.is_hashing);

    assert!(h.store.device_by_name("b2").await.unwrap().is_hashing);
}

#[tokio::test(start_paused = true)]
async fn slow_device_times_out() {
    let slow = paused(scheduled_device("a1", "10.0.0.1", night_and_day(None)));
    let quick = paused(scheduled_device("b2", "10.0.0.2", night_and_day(None)));
    let h = harness(
        ScriptedDriver::new()
            .with_device(
                "10.0.0.1",
                ScriptedDevice {
                    delay: Some(StdDuration::from_secs(60)),
                    ..ScriptedDevice::paused()
                },
            )
            .with_device("10.0.0.2", ScriptedDevice::paused()),
        vec![slow, quick],
    );

    let report = h.controller.enforce_all(at(23, 0)).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.changed, 1);
    assert!(!h.store.device_by_name("a1").await.unwrap().is_hashing);
    assert!(h.store.device_by_name("b2").await.unwrap().is_hashing);
}

// ── Concurrent passes ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_sampling_keeps_enforced_state() {
    let mut device = paused(scheduled_device("a1", "10.0.0.1", night_and_day(None)));
    device.changed_at = Some(at(20, 0));
    let h = harness(
        ScriptedDriver::new().with_device(
            "10.0.0.1",
            ScriptedDevice {
                delay: Some(StdDuration::from_millis(100)),
                ..ScriptedDevice::paused()
            },
        ),
        vec![device],
    );

    let (sampled, enforced) = tokio::join!(
        h.controller.sample_all(at(23, 0)),
        h.controller.enforce_all(at(23, 0))
    );
    assert_eq!(sampled.unwrap().failed, 0);
    assert_eq!(enforced.unwrap().changed, 1);

    assert!(h.driver.device("10.0.0.1").unwrap().mining);
    let stored = h.store.device_by_name("a1").await.unwrap();
    assert!(stored.is_hashing);
    assert_eq!(stored.status(), DeviceStatus::Hashing);
    assert_eq!(stored.changed_at, Some(at(23, 0)));

    // The stored state matches the hardware, so nothing is re-sent.
    h.driver.clear_calls();
    let report = h.controller.enforce_all(at(23, 1)).await.unwrap();
    assert_eq!(report.changed, 0);
    assert!(h.driver.commands().is_empty());
}
