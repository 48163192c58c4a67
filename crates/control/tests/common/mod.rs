//! Shared fixtures for controller integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use hashctl_control::{Controller, Device, MemoryStore, Profile};
use hashctl_core::config::ControlConfig;
use hashctl_core::Uuid;
use hashctl_driver::ScriptedDriver;
use hashctl_schedule::{Interval, PerformanceLimit, Schedule};

/// 2025-01-15 (a Wednesday) at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
}

/// "night" 22:00-06:00 hashing, "day" 06:00-22:00 paused.
pub fn night_and_day(night_limit: Option<u32>) -> Schedule {
    let mut night = Interval::daily("22:00", "06:00", true)
        .unwrap()
        .named("night")
        .with_price(0.08)
        .with_order(1);
    if let Some(watts) = night_limit {
        night = night.with_limit(PerformanceLimit::with_power_limit(watts));
    }
    let day = Interval::daily("06:00", "22:00", false)
        .unwrap()
        .named("day")
        .with_price(0.21)
        .with_order(2);
    Schedule::new(Some("night-and-day".into()), Tz::UTC, vec![night, day])
}

pub fn scheduled_device(name: &str, address: &str, schedule: Schedule) -> Device {
    Device::new(name, address).with_profile(Profile {
        id: Uuid::new_v4(),
        name: format!("{name}-profile"),
        schedule: Some(schedule),
    })
}

/// Mark the stored flags as the device reporting a paused state.
pub fn paused(mut device: Device) -> Device {
    device.is_online = true;
    device.is_hashing = false;
    device.is_stable = false;
    device
}

/// Mark the stored flags as the device hashing at `power_limit`.
pub fn hashing(mut device: Device, power_limit: u32) -> Device {
    device.is_online = true;
    device.is_hashing = true;
    device.is_stable = true;
    device.power_limit = Some(power_limit);
    device
}

pub fn config() -> ControlConfig {
    ControlConfig {
        device_timeout_secs: 5,
        ..ControlConfig::default()
    }
}

pub struct Harness {
    pub driver: Arc<ScriptedDriver>,
    pub store: Arc<MemoryStore>,
    pub controller: Controller,
}

pub fn harness(driver: ScriptedDriver, devices: Vec<Device>) -> Harness {
    harness_with(driver, devices, config())
}

pub fn harness_with(driver: ScriptedDriver, devices: Vec<Device>, config: ControlConfig) -> Harness {
    let driver = Arc::new(driver);
    let store = Arc::new(MemoryStore::with_devices(devices));
    let controller = Controller::new(driver.clone(), store.clone(), config);
    Harness {
        driver,
        store,
        controller,
    }
}
