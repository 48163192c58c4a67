//! Recorded telemetry snapshots and their derived costs.

use chrono::{DateTime, Utc};
use hashctl_core::{DeviceId, IntervalId, SampleId, Uuid};
use hashctl_driver::Telemetry;
use serde::{Deserialize, Serialize};

use crate::device::Device;

/// Joules per kilowatt-hour.
const JOULES_PER_KWH: f64 = 3.6e6;

/// Immutable point-in-time record of a device's performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub id: SampleId,
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    /// Length of the period this sample stands for.
    pub interval_secs: u32,

    pub is_online: bool,
    pub is_hashing: bool,
    pub is_stable: bool,

    pub hashrate_ths: f64,
    /// Power draw in watts.
    pub power: u32,
    pub power_limit: Option<u32>,
    /// Joules per terahash.
    pub efficiency: Option<f64>,
    pub temp: Option<f64>,
    pub env_temp: Option<f64>,

    pub price_per_kwh: f64,
    /// Interval that applied when the sample was taken.
    pub interval_id: Option<IntervalId>,
}

impl PerformanceSample {
    /// A sample from fresh telemetry, carrying the device's current flags.
    pub fn from_telemetry(
        device: &Device,
        telemetry: &Telemetry,
        timestamp: DateTime<Utc>,
        interval_secs: u32,
        price_per_kwh: f64,
        interval_id: Option<IntervalId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device.id,
            timestamp,
            interval_secs,
            is_online: device.is_online,
            is_hashing: device.is_hashing,
            is_stable: device.is_stable,
            hashrate_ths: telemetry.hashrate_ths,
            power: telemetry.wattage,
            power_limit: telemetry.wattage_limit.or(device.power_limit),
            efficiency: telemetry.efficiency,
            temp: telemetry.temperature_avg,
            env_temp: telemetry.env_temp,
            price_per_kwh,
            interval_id,
        }
    }

    /// A zeroed sample for a device that could not be read.
    pub fn unreachable(
        device: &Device,
        timestamp: DateTime<Utc>,
        interval_secs: u32,
        price_per_kwh: f64,
        interval_id: Option<IntervalId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device.id,
            timestamp,
            interval_secs,
            is_online: device.is_online,
            is_hashing: false,
            is_stable: false,
            hashrate_ths: 0.0,
            power: 0,
            power_limit: device.power_limit,
            efficiency: None,
            temp: None,
            env_temp: None,
            price_per_kwh,
            interval_id,
        }
    }

    pub fn cost_per_second(&self) -> f64 {
        f64::from(self.power) * self.price_per_kwh / JOULES_PER_KWH
    }

    pub fn cost_per_hour(&self) -> f64 {
        self.cost_per_second() * 3600.0
    }

    /// Hourly cost per TH/s of hash rate; `None` while not hashing.
    pub fn cost_per_th(&self) -> Option<f64> {
        (self.hashrate_ths > 0.0).then(|| self.cost_per_hour() / self.hashrate_ths)
    }

    pub fn cost_for_period(&self) -> f64 {
        self.cost_per_second() * f64::from(self.interval_secs)
    }

    pub fn energy_kwh(&self) -> f64 {
        f64::from(self.power) * f64::from(self.interval_secs) / JOULES_PER_KWH
    }
}
