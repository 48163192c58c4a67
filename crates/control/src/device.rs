//! Devices, their profiles and status bookkeeping.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use hashctl_core::{DeviceId, ProfileId, Uuid};
use hashctl_driver::{DeviceEndpoint, DriverError, Telemetry};
use hashctl_schedule::{resolve, resolve_scheduled, Override, Resolution, Scenario, Schedule};
use serde::{Deserialize, Serialize};

use crate::status::DeviceStatus;

/// Named configuration shared by devices; links at most one schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "Uuid::new_v4")]
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

/// The persisted status fields of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub is_online: bool,
    pub is_hashing: bool,
    pub is_stable: bool,
    pub is_faulted: bool,
    pub power_limit: Option<u32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub changed_at: Option<DateTime<Utc>>,
}

/// What one status refresh learned about a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Reported {
        hashing: bool,
        stable: bool,
        power_limit: Option<u32>,
    },
    Unreachable,
    Faulted,
}

impl Observation {
    pub fn from_telemetry(telemetry: &Telemetry) -> Self {
        Observation::Reported {
            hashing: telemetry.is_mining,
            stable: telemetry.is_stable(),
            power_limit: telemetry.wattage_limit,
        }
    }

    /// Any failure other than a reported fault counts as unreachable.
    pub fn from_error(error: &DriverError) -> Self {
        if error.is_fault() {
            Observation::Faulted
        } else {
            Observation::Unreachable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default = "Uuid::new_v4")]
    pub id: DeviceId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_hashing: bool,
    #[serde(default)]
    pub is_stable: bool,
    #[serde(default)]
    pub is_faulted: bool,
    /// Power limit (watts) reported by the most recent refresh.
    #[serde(default)]
    pub power_limit: Option<u32>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// When the computed status last changed.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub manual_override: Option<Override>,
}

fn default_true() -> bool {
    true
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            password: None,
            is_active: true,
            is_online: false,
            is_hashing: false,
            is_stable: false,
            is_faulted: false,
            power_limit: None,
            updated_at: None,
            changed_at: None,
            profile: None,
            manual_override: None,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn endpoint(&self) -> DeviceEndpoint {
        DeviceEndpoint::new(self.address.clone(), self.password.clone())
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::classify(self.is_online, self.is_hashing, self.is_stable, self.is_faulted)
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.profile.as_ref().and_then(|p| p.schedule.as_ref())
    }

    /// The linked schedule's timezone, or UTC when there is none.
    pub fn timezone(&self) -> Tz {
        self.schedule().map_or(Tz::UTC, |s| s.timezone)
    }

    /// A scenario at `now` in the device's local time.
    pub fn scenario(&self, now: DateTime<Utc>, temperature: Option<f64>) -> Scenario {
        Scenario::at(now.with_timezone(&self.timezone())).with_temperature(temperature)
    }

    pub fn resolve(&self, scenario: &Scenario) -> Resolution<'_> {
        resolve(self.manual_override.as_ref(), self.schedule(), scenario)
    }

    pub fn resolve_scheduled(&self, scenario: &Scenario) -> Resolution<'_> {
        resolve_scheduled(self.schedule(), scenario)
    }

    pub fn state(&self) -> DeviceState {
        DeviceState {
            is_online: self.is_online,
            is_hashing: self.is_hashing,
            is_stable: self.is_stable,
            is_faulted: self.is_faulted,
            power_limit: self.power_limit,
            updated_at: self.updated_at,
            changed_at: self.changed_at,
        }
    }

    pub fn apply_state(&mut self, state: DeviceState) {
        self.is_online = state.is_online;
        self.is_hashing = state.is_hashing;
        self.is_stable = state.is_stable;
        self.is_faulted = state.is_faulted;
        self.power_limit = state.power_limit;
        self.updated_at = state.updated_at;
        self.changed_at = state.changed_at;
    }

    /// Record a refresh. `updated_at` is always stamped; `changed_at` only
    /// when the computed status differs from before. Returns whether it did.
    pub fn apply_observation(&mut self, observation: Observation, at: DateTime<Utc>) -> bool {
        let before = self.status();

        match observation {
            Observation::Reported {
                hashing,
                stable,
                power_limit,
            } => {
                self.is_online = true;
                self.is_hashing = hashing;
                self.is_stable = stable;
                self.is_faulted = false;
                if power_limit.is_some() {
                    self.power_limit = power_limit;
                }
            }
            Observation::Unreachable => {
                self.is_online = false;
                self.is_hashing = false;
                self.is_stable = false;
                self.is_faulted = false;
            }
            Observation::Faulted => {
                self.is_online = true;
                self.is_hashing = false;
                self.is_stable = false;
                self.is_faulted = true;
            }
        }

        self.updated_at = Some(at);
        let after = self.status();
        if before != after {
            tracing::info!(device = %self.name, from = %before, to = %after, "status changed");
            self.changed_at = Some(at);
            true
        } else {
            false
        }
    }
}
