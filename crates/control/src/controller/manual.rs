//! Operator commands. These bypass the debounce gate but hold the device
//! lock like the periodic passes.

use chrono::{DateTime, Utc};
use hashctl_schedule::{Override, OverrideRequest};
use tracing::info;

use super::Controller;
use crate::device::Device;
use crate::error::ControlError;
use crate::store::UnitOfWork;

impl Controller {
    pub async fn set_hashing(&self, name: &str, enabled: bool, now: DateTime<Utc>) -> Result<Device, ControlError> {
        let _guard = self.locks.acquire(name).await;
        let mut device = self.load_device(name).await?;
        self.bounded(name, async {
            info!(device = %device.name, enabled, "manual hashing change");
            self.driver.set_hashing(&device.endpoint(), enabled).await?;
            self.refresh_status(&mut device, now).await;

            let mut work = UnitOfWork::new(device.id);
            work.save_device(&device);
            self.store.commit(work).await?;
            Ok::<_, ControlError>(())
        })
        .await?;
        Ok(device)
    }

    pub async fn set_power_limit(&self, name: &str, watts: u32, now: DateTime<Utc>) -> Result<Device, ControlError> {
        if watts == 0 {
            return Err(ControlError::InvalidRequest("power limit must be positive".into()));
        }
        let _guard = self.locks.acquire(name).await;
        let mut device = self.load_device(name).await?;
        self.bounded(name, async {
            info!(device = %device.name, watts, "manual power limit change");
            self.driver.set_power_limit(&device.endpoint(), watts).await?;
            self.refresh_status(&mut device, now).await;

            let mut work = UnitOfWork::new(device.id);
            work.save_device(&device);
            self.store.commit(work).await?;
            Ok::<_, ControlError>(())
        })
        .await?;
        Ok(device)
    }

    /// Attach a new override to the device, replacing any previous one.
    pub async fn create_override(
        &self,
        name: &str,
        request: &OverrideRequest,
        now: DateTime<Utc>,
    ) -> Result<Override, ControlError> {
        if request.power_limit == Some(0) {
            return Err(ControlError::InvalidRequest("power limit must be positive".into()));
        }

        let _guard = self.locks.acquire(name).await;
        let device = self.load_device(name).await?;
        let latest = self.store.latest_sample(device.id).await?;
        let scenario = device.scenario(now, latest.and_then(|s| s.env_temp));
        let scheduled = device.resolve_scheduled(&scenario).interval();

        let created = request.build(scheduled, &scenario.moment, self.config.override_min_hours);
        info!(
            device = %device.name,
            hashing = created.interval.hashing_enabled,
            start = %created.interval.daytime_start,
            end = %created.interval.daytime_end,
            expires_at = %created.expires_at,
            "override created"
        );

        let mut work = UnitOfWork::new(device.id);
        work.replace_override(created.clone());
        self.store.commit(work).await?;
        Ok(created)
    }

    pub async fn clear_override(&self, name: &str) -> Result<(), ControlError> {
        let _guard = self.locks.acquire(name).await;
        let device = self.load_device(name).await?;
        let mut work = UnitOfWork::new(device.id);
        work.clear_override();
        self.store.commit(work).await?;
        info!(device = %device.name, "override cleared");
        Ok(())
    }
}
