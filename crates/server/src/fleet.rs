//! Fleet description file: schedules, profiles and devices in TOML.
//!
//! ```toml
//! [[schedules]]
//! name = "winter"
//! timezone = "America/Denver"
//!
//! [[schedules.intervals]]
//! name = "night"
//! daytime_start = "22:00"
//! daytime_end = "06:00"
//! hashing_enabled = true
//! price_per_kwh = 0.08
//!
//! [[profiles]]
//! name = "s19"
//! schedule = "winter"
//!
//! [[devices]]
//! name = "rack1-a1"
//! address = "10.0.0.11"
//! profile = "s19"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context};
use hashctl_control::{Device, Profile};
use hashctl_core::Uuid;
use hashctl_schedule::Schedule;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub profiles: Vec<ProfileEntry>,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    /// Name of a schedule in the same file.
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Name of a profile in the same file.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl FleetFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fleet file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid fleet file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve profile and schedule references into devices.
    pub fn into_devices(self) -> anyhow::Result<Vec<Device>> {
        let mut schedules: HashMap<String, Schedule> = HashMap::new();
        for schedule in self.schedules {
            let Some(name) = schedule.name.clone() else {
                bail!("every schedule in a fleet file needs a name");
            };
            if schedules.insert(name.clone(), schedule).is_some() {
                bail!("duplicate schedule '{name}'");
            }
        }

        let mut profiles: HashMap<String, Profile> = HashMap::new();
        for entry in self.profiles {
            let schedule = match &entry.schedule {
                Some(name) => Some(
                    schedules
                        .get(name)
                        .cloned()
                        .with_context(|| format!("profile '{}' references unknown schedule '{name}'", entry.name))?,
                ),
                None => None,
            };
            let profile = Profile {
                id: Uuid::new_v4(),
                name: entry.name.clone(),
                schedule,
            };
            if profiles.insert(entry.name.clone(), profile).is_some() {
                bail!("duplicate profile '{}'", entry.name);
            }
        }

        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());
        for entry in self.devices {
            if !seen.insert(entry.name.clone()) {
                bail!("duplicate device '{}'", entry.name);
            }
            let mut device = Device::new(entry.name, entry.address);
            device.password = entry.password;
            device.is_active = entry.active;
            if let Some(name) = &entry.profile {
                let profile = profiles
                    .get(name)
                    .cloned()
                    .with_context(|| format!("device '{}' references unknown profile '{name}'", device.name))?;
                device.profile = Some(profile);
            }
            devices.push(device);
        }
        Ok(devices)
    }
}
