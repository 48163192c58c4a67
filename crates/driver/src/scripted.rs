//! In-memory driver that simulates devices and records every call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::traits::{DeviceEndpoint, DriverError, MinerDriver, Telemetry};

/// Simulated state of one device.
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    pub online: bool,
    /// Reported as a device fault on every read.
    pub fault: Option<String>,
    pub mining: bool,
    pub stable: bool,
    /// Keep `stable` false after hashing is switched on.
    pub ramps_up: bool,
    pub hashrate_ths: f64,
    pub wattage: u32,
    pub power_limit: u32,
    pub env_temp: Option<f64>,
    pub errors: Vec<String>,
    /// Applied before answering any call.
    pub delay: Option<Duration>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self {
            online: true,
            fault: None,
            mining: false,
            stable: false,
            ramps_up: false,
            hashrate_ths: 0.0,
            wattage: 15,
            power_limit: 3000,
            env_temp: None,
            errors: Vec::new(),
            delay: None,
        }
    }
}

impl ScriptedDevice {
    pub fn hashing() -> Self {
        Self {
            mining: true,
            stable: true,
            hashrate_ths: 100.0,
            wattage: 3000,
            ..Default::default()
        }
    }

    pub fn paused() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            ..Default::default()
        }
    }
}

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchTelemetry(String),
    FetchErrors(String),
    SetHashing(String, bool),
    SetPowerLimit(String, u32),
}

impl Call {
    pub fn is_command(&self) -> bool {
        matches!(self, Call::SetHashing(..) | Call::SetPowerLimit(..))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedDriver {
    devices: Mutex<HashMap<String, ScriptedDevice>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, address: impl Into<String>, device: ScriptedDevice) -> Self {
        self.insert(address, device);
        self
    }

    pub fn insert(&self, address: impl Into<String>, device: ScriptedDevice) {
        self.devices.lock().unwrap().insert(address.into(), device);
    }

    /// Mutate a simulated device in place.
    pub fn update(&self, address: &str, f: impl FnOnce(&mut ScriptedDevice)) {
        if let Some(device) = self.devices.lock().unwrap().get_mut(address) {
            f(device);
        }
    }

    pub fn device(&self, address: &str) -> Option<ScriptedDevice> {
        self.devices.lock().unwrap().get(address).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the state-changing calls.
    pub fn commands(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_command).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn reach(&self, endpoint: &DeviceEndpoint) -> Result<ScriptedDevice, DriverError> {
        let device = self
            .device(&endpoint.address)
            .ok_or_else(|| DriverError::Unreachable(format!("{}: no route to host", endpoint.address)))?;
        if let Some(delay) = device.delay {
            tokio::time::sleep(delay).await;
        }
        if !device.online {
            return Err(DriverError::Unreachable(format!("{}: connection refused", endpoint.address)));
        }
        if let Some(fault) = &device.fault {
            return Err(DriverError::Fault(fault.clone()));
        }
        Ok(device)
    }
}

#[async_trait::async_trait]
impl MinerDriver for ScriptedDriver {
    async fn fetch_telemetry(&self, endpoint: &DeviceEndpoint) -> Result<Telemetry, DriverError> {
        self.record(Call::FetchTelemetry(endpoint.address.clone()));
        let d = self.reach(endpoint).await?;
        let efficiency = (d.hashrate_ths > 0.0).then(|| f64::from(d.wattage) / d.hashrate_ths);
        Ok(Telemetry {
            hashrate_ths: d.hashrate_ths,
            wattage: d.wattage,
            wattage_limit: Some(d.power_limit),
            efficiency,
            temperature_avg: d.mining.then_some(65.0),
            env_temp: d.env_temp,
            is_mining: d.mining,
            upfreq_complete: None,
            hash_stable: Some(d.stable),
            command_errors: Default::default(),
            raw: serde_json::json!({
                "address": endpoint.address,
                "is_mining": d.mining,
                "wattage": d.wattage,
                "wattage_limit": d.power_limit,
            }),
        })
    }

    async fn fetch_errors(&self, endpoint: &DeviceEndpoint) -> Result<Vec<String>, DriverError> {
        self.record(Call::FetchErrors(endpoint.address.clone()));
        Ok(self.reach(endpoint).await?.errors)
    }

    async fn set_hashing(&self, endpoint: &DeviceEndpoint, enabled: bool) -> Result<(), DriverError> {
        self.record(Call::SetHashing(endpoint.address.clone(), enabled));
        self.reach(endpoint).await?;
        self.update(&endpoint.address, |d| {
            d.mining = enabled;
            d.stable = enabled && !d.ramps_up;
            if enabled {
                d.hashrate_ths = 100.0;
                d.wattage = d.power_limit;
            } else {
                d.hashrate_ths = 0.0;
                d.wattage = 15;
            }
        });
        Ok(())
    }

    async fn set_power_limit(&self, endpoint: &DeviceEndpoint, watts: u32) -> Result<(), DriverError> {
        self.record(Call::SetPowerLimit(endpoint.address.clone(), watts));
        self.reach(endpoint).await?;
        self.update(&endpoint.address, |d| {
            d.power_limit = watts;
            if d.mining {
                d.wattage = watts;
            }
        });
        Ok(())
    }

    fn driver_name(&self) -> &str {
        "scripted"
    }
}
