//! Schedule enforcement pass.

use chrono::{DateTime, Utc};
use hashctl_schedule::{Interval, Resolution, Scenario};
use tracing::{debug, info};

use super::{Controller, CycleReport, DeviceOutcome};
use crate::budget;
use crate::decision::{self, ControlAction};
use crate::device::Device;
use crate::error::ControlError;
use crate::sample::PerformanceSample;
use crate::store::UnitOfWork;

impl Controller {
    /// Bring every active device in line with its schedule.
    pub async fn enforce_all(&self, now: DateTime<Utc>) -> Result<CycleReport, ControlError> {
        info!("enforcing schedules on active devices");
        self.run_fleet("enforce", move |name| async move { self.enforce_device(&name, now).await })
            .await
    }

    /// Enforce the schedule on one device, working from its stored state.
    pub async fn enforce_device(&self, name: &str, now: DateTime<Utc>) -> Result<DeviceOutcome, ControlError> {
        let _guard = self.locks.acquire(name).await;
        let device = self.load_device(name).await?;
        self.bounded(name, self.enforce_loaded(device, now)).await
    }

    async fn enforce_loaded(&self, mut device: Device, now: DateTime<Utc>) -> Result<DeviceOutcome, ControlError> {
        if !device.is_online {
            debug!(device = %device.name, "ignoring offline device");
            return Ok(DeviceOutcome::Skipped);
        }

        let latest = self.store.latest_sample(device.id).await?;
        let scenario = device.scenario(now, latest.as_ref().and_then(|s| s.env_temp));

        let (desired, target_limit) = {
            let resolution = device.resolve(&scenario);
            log_resolution(&device, &resolution, &scenario);
            let exhausted = self.budget_exhausted(&device, &resolution, &scenario).await?;
            (
                decision::desired_hashing(&device, &resolution, &scenario.moment, exhausted),
                resolution.interval().and_then(Interval::power_limit),
            )
        };

        let last_limit = match (desired, target_limit) {
            (true, Some(_)) => self.last_power_limit(&device, latest.as_ref()).await,
            _ => device.power_limit,
        };

        let actions = decision::plan(&device, desired, target_limit, last_limit);
        if actions.is_empty() {
            debug!(device = %device.name, hashing = desired, "device in desired state");
            return Ok(DeviceOutcome::Unchanged);
        }
        if !self.debounce.can_change_hashing_state(&device, now) {
            return Ok(DeviceOutcome::Debounced);
        }

        let endpoint = device.endpoint();
        for action in &actions {
            info!(device = %device.name, status = %device.status(), %action, "applying control action");
            match *action {
                ControlAction::SetHashing(enabled) => self.driver.set_hashing(&endpoint, enabled).await?,
                ControlAction::SetPowerLimit(watts) => self.driver.set_power_limit(&endpoint, watts).await?,
            }
            self.refresh_status(&mut device, now).await;
        }

        let mut work = UnitOfWork::new(device.id);
        work.save_device(&device);
        self.store.commit(work).await?;
        Ok(DeviceOutcome::Changed(actions))
    }

    /// Whether the energy budget of a scheduled interval is used up.
    async fn budget_exhausted(
        &self,
        device: &Device,
        resolution: &Resolution<'_>,
        scenario: &Scenario,
    ) -> Result<bool, ControlError> {
        let Resolution::Scheduled(interval) = resolution else {
            return Ok(false);
        };
        let Some(limit) = interval.performance_limit.as_ref().filter(|l| l.has_budget()) else {
            return Ok(false);
        };
        let Some(since) = budget::earliest_budget_start(limit, &scenario.moment) else {
            return Ok(false);
        };

        let samples = self.store.samples_since(device.id, since).await?;
        Ok(budget::budget_exhausted(limit, &samples, &scenario.moment))
    }

    /// Limit from the last refresh, else the latest sample, else the device.
    async fn last_power_limit(&self, device: &Device, latest: Option<&PerformanceSample>) -> Option<u32> {
        if let Some(limit) = device.power_limit.or_else(|| latest.and_then(|s| s.power_limit)) {
            return Some(limit);
        }
        match self.driver.fetch_telemetry(&device.endpoint()).await {
            Ok(telemetry) => telemetry.wattage_limit,
            Err(e) => {
                debug!(device = %device.name, error = %e, "could not read power limit");
                None
            }
        }
    }
}

fn log_resolution(device: &Device, resolution: &Resolution<'_>, scenario: &Scenario) {
    match resolution.interval() {
        Some(interval) => debug!(
            device = %device.name,
            status = %device.status(),
            source = resolution.source_label(),
            interval = %interval.label(),
            hashing = interval.hashing_enabled,
            power_limit = ?interval.power_limit(),
            until = %interval.next_end_time(&scenario.moment),
            "current interval"
        ),
        None => debug!(
            device = %device.name,
            status = %device.status(),
            schedule = ?device.schedule().map(|s| s.id),
            "no current interval"
        ),
    }
}
