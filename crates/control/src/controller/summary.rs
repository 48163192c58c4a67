//! Read-only views of devices for the control surface.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::Controller;
use crate::device::Device;
use crate::error::ControlError;
use crate::sample::PerformanceSample;
use crate::status::DeviceStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSummary {
    pub name: String,
    /// `override` or `schedule`.
    pub source: &'static str,
    pub hashing_enabled: bool,
    pub power_limit: Option<u32>,
    pub price_per_kwh: Option<f64>,
    /// When the current window closes.
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub timestamp: DateTime<Utc>,
    pub hashrate_ths: f64,
    pub power: u32,
    pub power_limit: Option<u32>,
    pub efficiency: Option<f64>,
    pub temp: Option<f64>,
    pub env_temp: Option<f64>,
    pub price_per_kwh: f64,
    pub cost_per_hour: f64,
    pub cost_per_th: Option<f64>,
}

impl From<&PerformanceSample> for SampleSummary {
    fn from(s: &PerformanceSample) -> Self {
        Self {
            timestamp: s.timestamp,
            hashrate_ths: s.hashrate_ths,
            power: s.power,
            power_limit: s.power_limit,
            efficiency: s.efficiency,
            temp: s.temp,
            env_temp: s.env_temp,
            price_per_kwh: s.price_per_kwh,
            cost_per_hour: s.cost_per_hour(),
            cost_per_th: s.cost_per_th(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub status: DeviceStatus,
    pub is_active: bool,
    pub timezone: String,
    pub power_limit: Option<u32>,
    pub changed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub interval: Option<IntervalSummary>,
    pub latest_sample: Option<SampleSummary>,
    /// Errors reported by the device; empty when it is not online.
    pub errors: Vec<String>,
}

impl Controller {
    pub async fn summaries(&self, now: DateTime<Utc>) -> Result<Vec<DeviceSummary>, ControlError> {
        let devices = self.store.active_devices().await?;
        let mut summaries = Vec::with_capacity(devices.len());
        for device in devices {
            summaries.push(self.summarize(&device, now).await?);
        }
        Ok(summaries)
    }

    pub async fn summary(&self, name: &str, now: DateTime<Utc>) -> Result<DeviceSummary, ControlError> {
        let device = self.load_device(name).await?;
        self.summarize(&device, now).await
    }

    /// The device's unprocessed telemetry document.
    pub async fn raw_telemetry(&self, name: &str) -> Result<serde_json::Value, ControlError> {
        let device = self.load_device(name).await?;
        self.bounded(name, async {
            self.driver.raw(&device.endpoint()).await.map_err(ControlError::from)
        })
        .await
    }

    async fn summarize(&self, device: &Device, now: DateTime<Utc>) -> Result<DeviceSummary, ControlError> {
        let latest = self.store.latest_sample(device.id).await?;
        let scenario = device.scenario(now, latest.as_ref().and_then(|s| s.env_temp));
        let resolution = device.resolve(&scenario);

        let interval = resolution.interval().map(|i| IntervalSummary {
            name: i.label(),
            source: resolution.source_label(),
            hashing_enabled: i.hashing_enabled,
            power_limit: i.power_limit(),
            price_per_kwh: i.price_per_kwh,
            until: i.next_end_time(&scenario.moment).with_timezone(&Utc),
        });

        let errors = if device.is_online {
            let fetched = self
                .bounded(&device.name, async {
                    self.driver.fetch_errors(&device.endpoint()).await.map_err(ControlError::from)
                })
                .await;
            fetched.unwrap_or_else(|e| {
                warn!(device = %device.name, error = %e, "could not fetch device errors");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(DeviceSummary {
            name: device.name.clone(),
            status: device.status(),
            is_active: device.is_active,
            timezone: device.timezone().name().to_string(),
            power_limit: device.power_limit,
            changed_at: device.changed_at,
            updated_at: device.updated_at,
            interval,
            latest_sample: latest.as_ref().map(SampleSummary::from),
            errors,
        })
    }
}
