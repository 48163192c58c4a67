//! Persistence seam for devices, overrides and samples.
//!
//! All writes for one device go through a [`UnitOfWork`] that the store
//! applies atomically in [`RecordStore::commit`]. A unit of work that is
//! dropped without being committed is discarded.

mod memory;
#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use hashctl_core::{DeviceId, EntityKind};
use hashctl_schedule::Override;
use tracing::debug;

use crate::device::{Device, DeviceState};
use crate::sample::PerformanceSample;

pub use memory::MemoryStore;

/// Errors returned by record stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Override change carried by a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideChange {
    Replace(Override),
    Clear,
}

/// Pending writes for a single device.
#[derive(Debug)]
pub struct UnitOfWork {
    device_id: DeviceId,
    state: Option<DeviceState>,
    samples: Vec<PerformanceSample>,
    override_change: Option<OverrideChange>,
    finished: bool,
}

/// The contents of a unit of work, handed to the store on commit.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkParts {
    pub device_id: DeviceId,
    pub state: Option<DeviceState>,
    pub samples: Vec<PerformanceSample>,
    pub override_change: Option<OverrideChange>,
}

impl UnitOfWork {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            state: None,
            samples: Vec::new(),
            override_change: None,
            finished: false,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Persist the device's current status fields.
    pub fn save_device(&mut self, device: &Device) {
        self.state = Some(device.state());
    }

    pub fn append_sample(&mut self, sample: PerformanceSample) {
        self.samples.push(sample);
    }

    pub fn replace_override(&mut self, value: Override) {
        self.override_change = Some(OverrideChange::Replace(value));
    }

    pub fn clear_override(&mut self) {
        self.override_change = Some(OverrideChange::Clear);
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.samples.is_empty() && self.override_change.is_none()
    }

    /// Discard all pending writes.
    pub fn rollback(mut self) {
        debug!(device_id = %self.device_id, "unit of work rolled back");
        self.finished = true;
    }

    /// Take the pending writes for committing.
    pub fn into_parts(mut self) -> WorkParts {
        self.finished = true;
        WorkParts {
            device_id: self.device_id,
            state: self.state.take(),
            samples: std::mem::take(&mut self.samples),
            override_change: self.override_change.take(),
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.finished && !self.is_empty() {
            debug!(device_id = %self.device_id, "unit of work dropped without commit, changes discarded");
        }
    }
}

/// Read/write contract of the device record store.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn device_by_name(&self, name: &str) -> Result<Device, StoreError>;

    /// Active devices ordered by name.
    async fn active_devices(&self) -> Result<Vec<Device>, StoreError>;

    async fn latest_sample(&self, device_id: DeviceId) -> Result<Option<PerformanceSample>, StoreError>;

    /// Samples taken at or after `since`, oldest first.
    async fn samples_since(
        &self,
        device_id: DeviceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PerformanceSample>, StoreError>;

    /// Apply all writes of `work` atomically.
    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError>;

    /// Human-readable name for this store (e.g., "memory", "postgres").
    fn store_name(&self) -> &str;
}
