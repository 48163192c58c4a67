//! In-memory [`RecordStore`] for tests and database-less runs.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use hashctl_core::{DeviceId, EntityKind};
use tokio::sync::RwLock;

use super::{OverrideChange, RecordStore, StoreError, UnitOfWork};
use crate::device::Device;
use crate::sample::PerformanceSample;

#[derive(Debug, Default)]
struct Tables {
    /// Devices keyed by name, which keeps them ordered.
    devices: BTreeMap<String, Device>,
    samples: HashMap<DeviceId, Vec<PerformanceSample>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<DeviceId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let tables = Tables {
            devices: devices.into_iter().map(|d| (d.name.clone(), d)).collect(),
            samples: HashMap::new(),
        };
        Self {
            tables: RwLock::new(tables),
            failing: RwLock::default(),
        }
    }

    /// Insert or replace a device, keyed by name.
    pub async fn insert(&self, device: Device) {
        self.tables.write().await.devices.insert(device.name.clone(), device);
    }

    pub async fn samples(&self, device_id: DeviceId) -> Vec<PerformanceSample> {
        self.tables
            .read()
            .await
            .samples
            .get(&device_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every commit for `device_id` fail with a backend error.
    pub async fn fail_commits_for(&self, device_id: DeviceId) {
        self.failing.write().await.insert(device_id);
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn device_by_name(&self, name: &str) -> Result<Device, StoreError> {
        self.tables
            .read()
            .await
            .devices
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Device,
                key: name.to_string(),
            })
    }

    async fn active_devices(&self) -> Result<Vec<Device>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .devices
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect())
    }

    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<PerformanceSample>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .samples
            .get(&device_id)
            .and_then(|s| s.iter().max_by_key(|s| s.timestamp))
            .cloned())
    }

    async fn samples_since(
        &self,
        device_id: DeviceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSample>, StoreError> {
        let tables = self.tables.read().await;
        let mut samples: Vec<_> = tables
            .samples
            .get(&device_id)
            .map(|s| s.iter().filter(|s| s.timestamp >= since).cloned().collect())
            .unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        if self.failing.read().await.contains(&work.device_id()) {
            let device_id = work.device_id();
            work.rollback();
            return Err(StoreError::Backend(format!("commit rejected for device {device_id}")));
        }

        let parts = work.into_parts();
        let mut tables = self.tables.write().await;
        let device = tables
            .devices
            .values_mut()
            .find(|d| d.id == parts.device_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Device,
                key: parts.device_id.to_string(),
            })?;

        if let Some(state) = parts.state {
            device.apply_state(state);
        }
        match parts.override_change {
            Some(OverrideChange::Replace(o)) => device.manual_override = Some(o),
            Some(OverrideChange::Clear) => device.manual_override = None,
            None => {}
        }
        if !parts.samples.is_empty() {
            tables
                .samples
                .entry(parts.device_id)
                .or_default()
                .extend(parts.samples);
        }
        Ok(())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
