//! [`Controller`]: runs control passes over the device fleet.
//!
//! Each device is handled on its own: its driver calls are bounded by the
//! per-device timeout and its writes go through one unit of work, so a slow
//! or failing device never affects the others in the same cycle.
//!
//! Every pass that writes device state holds that device's lock and reloads
//! the device from the store after taking it. Sampling, enforcement and
//! operator commands on one device therefore never interleave.

mod enforce;
mod locks;
mod manual;
mod sampling;
mod summary;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hashctl_core::config::ControlConfig;
use hashctl_driver::{MinerDriver, Telemetry};
use serde::Serialize;
use tracing::{info, warn};

use crate::decision::{ControlAction, Debounce};
use crate::device::{Device, Observation};
use crate::error::ControlError;
use crate::store::{RecordStore, StoreError};
use locks::DeviceLocks;

pub use summary::{DeviceSummary, IntervalSummary, SampleSummary};

/// What a device's pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// Nothing was attempted (for example, the device is offline).
    Skipped,
    /// Device already in the desired state.
    Unchanged,
    /// A change was due but the debounce gate was closed.
    Debounced,
    Changed(Vec<ControlAction>),
    Sampled,
}

/// Tally of one fleet cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub processed: usize,
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, device: &str, result: Result<DeviceOutcome, ControlError>) {
        self.processed += 1;
        match result {
            Ok(DeviceOutcome::Changed(_)) => self.changed += 1,
            Ok(DeviceOutcome::Skipped) | Ok(DeviceOutcome::Debounced) => self.skipped += 1,
            Ok(DeviceOutcome::Unchanged) | Ok(DeviceOutcome::Sampled) => {}
            Err(e) => {
                self.failed += 1;
                warn!(device = %device, error = %e, unreachable = e.is_unreachable(), "device pass failed");
            }
        }
    }
}

pub struct Controller {
    driver: Arc<dyn MinerDriver>,
    store: Arc<dyn RecordStore>,
    config: ControlConfig,
    debounce: Debounce,
    locks: DeviceLocks,
}

impl Controller {
    pub fn new(driver: Arc<dyn MinerDriver>, store: Arc<dyn RecordStore>, config: ControlConfig) -> Self {
        let debounce = Debounce::minutes(config.debounce_minutes);
        Self {
            driver,
            store,
            config,
            debounce,
            locks: DeviceLocks::default(),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Backend label of the record store.
    pub fn store_name(&self) -> &str {
        self.store.store_name()
    }

    pub fn driver_name(&self) -> &str {
        self.driver.driver_name()
    }

    fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.config.device_timeout_secs)
    }

    async fn load_device(&self, name: &str) -> Result<Device, ControlError> {
        match self.store.device_by_name(name).await {
            Ok(device) => Ok(device),
            Err(StoreError::NotFound { .. }) => Err(ControlError::DeviceNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `fut` under the per-device timeout. On expiry the future, and
    /// any unit of work it holds, is dropped.
    async fn bounded<T, F>(&self, device: &str, fut: F) -> Result<T, ControlError>
    where
        F: Future<Output = Result<T, ControlError>>,
    {
        match tokio::time::timeout(self.device_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout {
                device: device.to_string(),
                secs: self.config.device_timeout_secs,
            }),
        }
    }

    /// Run one pass per active device, in name order. Each pass is handed
    /// only the name and reloads the device under its lock.
    async fn run_fleet<'a, F, Fut>(&'a self, task: &str, pass: F) -> Result<CycleReport, ControlError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<DeviceOutcome, ControlError>> + 'a,
    {
        let names: Vec<String> = self
            .store
            .active_devices()
            .await?
            .into_iter()
            .map(|device| device.name)
            .collect();
        let mut report = CycleReport::default();

        for name in names {
            let result = pass(name.clone()).await;
            report.record(&name, result);
        }

        info!(
            task,
            processed = report.processed,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            "cycle complete"
        );
        Ok(report)
    }

    /// Re-read the device's flags from hardware. Returns the telemetry when
    /// the device answered.
    pub async fn refresh_status(&self, device: &mut Device, now: DateTime<Utc>) -> Option<Telemetry> {
        match self.driver.fetch_telemetry(&device.endpoint()).await {
            Ok(telemetry) => {
                device.apply_observation(Observation::from_telemetry(&telemetry), now);
                Some(telemetry)
            }
            Err(e) => {
                warn!(device = %device.name, error = %e, "status refresh failed");
                device.apply_observation(Observation::from_error(&e), now);
                None
            }
        }
    }
}
