use serde::{Deserialize, Serialize};

/// Operating status computed from a device's reported flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Offline,
    Transitioning,
    Hashing,
    Paused,
    /// The device answered but reported a fault.
    Error,
}

impl DeviceStatus {
    pub fn classify(online: bool, hashing: bool, stable: bool, faulted: bool) -> Self {
        if faulted {
            return DeviceStatus::Error;
        }
        match (hashing, stable, online) {
            (true, true, _) => DeviceStatus::Hashing,
            (true, false, _) => DeviceStatus::Transitioning,
            (false, _, true) => DeviceStatus::Paused,
            (false, _, false) => DeviceStatus::Offline,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Transitioning => write!(f, "transitioning"),
            DeviceStatus::Hashing => write!(f, "hashing"),
            DeviceStatus::Paused => write!(f, "paused"),
            DeviceStatus::Error => write!(f, "error"),
        }
    }
}
