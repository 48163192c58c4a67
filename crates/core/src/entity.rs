use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

pub type DeviceId = Uuid;
pub type ProfileId = Uuid;
pub type ScheduleId = Uuid;
pub type IntervalId = Uuid;
pub type SampleId = Uuid;

/// Kinds of persisted records, used to label lookups and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Device,
    Profile,
    Schedule,
    Interval,
    PerformanceLimit,
    Sample,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Device => write!(f, "Device"),
            EntityKind::Profile => write!(f, "Profile"),
            EntityKind::Schedule => write!(f, "Schedule"),
            EntityKind::Interval => write!(f, "Interval"),
            EntityKind::PerformanceLimit => write!(f, "PerformanceLimit"),
            EntityKind::Sample => write!(f, "Sample"),
        }
    }
}
