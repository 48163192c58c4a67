//! Control decisions: desired hashing state, debounce gate and the
//! resulting device commands.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use hashctl_schedule::Resolution;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::Device;
use crate::status::DeviceStatus;

/// A command to send to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum ControlAction {
    SetHashing(bool),
    SetPowerLimit(u32),
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAction::SetHashing(enabled) => write!(f, "set_hashing({enabled})"),
            ControlAction::SetPowerLimit(watts) => write!(f, "set_power_limit({watts})"),
        }
    }
}

/// Whether the device should be hashing at `moment`.
///
/// Without a resolved interval the device keeps its current state. An
/// exhausted energy budget stops scheduled hashing but never an override.
pub fn desired_hashing(
    device: &Device,
    resolution: &Resolution<'_>,
    moment: &DateTime<Tz>,
    budget_exhausted: bool,
) -> bool {
    match resolution {
        Resolution::Override(interval) => interval.is_hashing_at(moment),
        Resolution::Scheduled(interval) => interval.is_hashing_at(moment) && !budget_exhausted,
        Resolution::Unscheduled => device.is_hashing,
    }
}

/// Commands that bring the device to the desired state.
///
/// `last_power_limit` is the limit the device is believed to run at. A
/// target limit is only applied while the device should be hashing.
pub fn plan(
    device: &Device,
    desired_hashing: bool,
    target_power_limit: Option<u32>,
    last_power_limit: Option<u32>,
) -> Vec<ControlAction> {
    let mut actions = Vec::new();
    if desired_hashing != device.is_hashing {
        actions.push(ControlAction::SetHashing(desired_hashing));
    }
    if desired_hashing {
        if let Some(target) = target_power_limit {
            if last_power_limit != Some(target) {
                actions.push(ControlAction::SetPowerLimit(target));
            }
        }
    }
    actions
}

/// Cool-down between hashing state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
    pub window: Duration,
}

impl Debounce {
    pub fn minutes(minutes: u64) -> Self {
        Self {
            window: i64::try_from(minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Offline and faulted devices may always be acted on. Otherwise the
    /// window must have passed since the last status change.
    pub fn can_change_hashing_state(&self, device: &Device, now: DateTime<Utc>) -> bool {
        let status = device.status();
        if matches!(status, DeviceStatus::Offline | DeviceStatus::Error) {
            return true;
        }
        let Some(changed_at) = device.changed_at else {
            return true;
        };

        let elapsed = now.signed_duration_since(changed_at);
        if elapsed < self.window {
            debug!(
                device = %device.name,
                %status,
                "state change debounced ({}s remaining)",
                (self.window - elapsed).num_seconds()
            );
            return false;
        }
        true
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::minutes(30)
    }
}
