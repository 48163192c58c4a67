//! Tests for the unit of work and the in-memory store.

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use chrono_tz::Tz;
    use hashctl_driver::Telemetry;
    use hashctl_schedule::OverrideRequest;

    use crate::device::{Device, Observation};
    use crate::sample::PerformanceSample;
    use crate::store::{MemoryStore, RecordStore, StoreError, UnitOfWork};

    fn fleet() -> MemoryStore {
        let mut retired = Device::new("c3", "10.0.0.3");
        retired.is_active = false;
        MemoryStore::with_devices([
            Device::new("b2", "10.0.0.2"),
            retired,
            Device::new("a1", "10.0.0.1"),
        ])
    }

    fn sample_at(device: &Device, minutes: i64) -> PerformanceSample {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        PerformanceSample::from_telemetry(device, &Telemetry::default(), at, 60, 0.0, None)
    }

    // -- reads -----------------------------------------------------------------

    #[tokio::test]
    async fn active_devices_ordered_by_name() {
        let store = fleet();
        let names: Vec<_> = store
            .active_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["a1", "b2"]);
    }

    #[tokio::test]
    async fn missing_device_is_not_found() {
        let err = fleet().device_by_name("zz").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(err.to_string(), "Device 'zz' not found");
    }

    // -- commit ----------------------------------------------------------------

    #[tokio::test]
    async fn commit_applies_state_samples_and_override() {
        let store = fleet();
        let mut device = store.device_by_name("a1").await.unwrap();
        device.apply_observation(
            Observation::Reported {
                hashing: true,
                stable: true,
                power_limit: Some(3100),
            },
            Utc::now(),
        );

        let now = Tz::UTC.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let o = OverrideRequest::default().build(None, &now, 2);

        let mut work = UnitOfWork::new(device.id);
        work.save_device(&device);
        work.append_sample(sample_at(&device, 2));
        work.append_sample(sample_at(&device, 1));
        work.replace_override(o.clone());
        store.commit(work).await.unwrap();

        let stored = store.device_by_name("a1").await.unwrap();
        assert!(stored.is_hashing);
        assert_eq!(stored.power_limit, Some(3100));
        assert_eq!(stored.manual_override, Some(o));

        let latest = store.latest_sample(device.id).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, sample_at(&device, 2).timestamp);

        let since = sample_at(&device, 1).timestamp;
        let samples = store.samples_since(device.id, since).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].timestamp < samples[1].timestamp);

        let mut work = UnitOfWork::new(device.id);
        work.clear_override();
        store.commit(work).await.unwrap();
        assert!(store.device_by_name("a1").await.unwrap().manual_override.is_none());
    }

    #[tokio::test]
    async fn dropped_or_rolled_back_work_changes_nothing() {
        let store = fleet();
        let mut device = store.device_by_name("a1").await.unwrap();
        device.is_online = true;

        {
            let mut work = UnitOfWork::new(device.id);
            work.save_device(&device);
            work.append_sample(sample_at(&device, 0));
        }
        let mut work = UnitOfWork::new(device.id);
        work.save_device(&device);
        work.rollback();

        assert!(!store.device_by_name("a1").await.unwrap().is_online);
        assert!(store.samples(device.id).await.is_empty());
    }

    #[tokio::test]
    async fn failing_backend_rejects_commit() {
        let store = fleet();
        let device = store.device_by_name("b2").await.unwrap();
        store.fail_commits_for(device.id).await;

        let mut work = UnitOfWork::new(device.id);
        work.append_sample(sample_at(&device, 0));
        let err = store.commit(work).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.samples(device.id).await.is_empty());
    }

    #[test]
    fn empty_work() {
        let work = UnitOfWork::new(hashctl_core::Uuid::new_v4());
        assert!(work.is_empty());
        let parts = work.into_parts();
        assert!(parts.samples.is_empty());
    }
}
