//! Status refresh and performance sampling pass.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Controller, CycleReport, DeviceOutcome};
use crate::device::Device;
use crate::error::ControlError;
use crate::sample::PerformanceSample;
use crate::store::UnitOfWork;

impl Controller {
    /// Refresh and sample every active device.
    pub async fn sample_all(&self, now: DateTime<Utc>) -> Result<CycleReport, ControlError> {
        info!("sampling active devices");
        self.run_fleet("sample", move |name| async move { self.sample_device(&name, now).await })
            .await
    }

    pub async fn sample_device(&self, name: &str, now: DateTime<Utc>) -> Result<DeviceOutcome, ControlError> {
        let _guard = self.locks.acquire(name).await;
        let device = self.load_device(name).await?;
        self.bounded(name, self.sample_loaded(device, now)).await
    }

    async fn sample_loaded(&self, mut device: Device, now: DateTime<Utc>) -> Result<DeviceOutcome, ControlError> {
        let telemetry = self.refresh_status(&mut device, now).await;

        let scenario = device.scenario(now, telemetry.as_ref().and_then(|t| t.env_temp));
        let (price, interval_id) = {
            let resolution = device.resolve(&scenario);
            let interval = resolution.interval();
            (
                interval.and_then(|i| i.price_per_kwh).unwrap_or(0.0),
                interval.map(|i| i.id),
            )
        };

        let interval_secs = u32::try_from(self.config.sample_period_secs).unwrap_or(u32::MAX);
        let sample = match &telemetry {
            Some(t) => PerformanceSample::from_telemetry(&device, t, now, interval_secs, price, interval_id),
            None => PerformanceSample::unreachable(&device, now, interval_secs, price, interval_id),
        };
        debug!(
            device = %device.name,
            status = %device.status(),
            power = sample.power,
            hashrate_ths = sample.hashrate_ths,
            price_per_kwh = price,
            "recording sample"
        );

        let mut work = UnitOfWork::new(device.id);
        work.save_device(&device);
        work.append_sample(sample);
        self.store.commit(work).await?;
        Ok(DeviceOutcome::Sampled)
    }
}
