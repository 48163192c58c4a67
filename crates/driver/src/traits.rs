//! MinerDriver trait definition and shared types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors that can occur while talking to a device.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The device could not be reached or did not answer in time.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered but reported a fault.
    #[error("device fault: {0}")]
    Fault(String),

    /// A specific command was rejected.
    #[error("command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl DriverError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DriverError::Unreachable(_))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, DriverError::Fault(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub password: Option<String>,
}

/// Where and how to reach one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    /// Host name or IP, optionally with `:port`.
    pub address: String,
    pub credentials: Credentials,
}

impl DeviceEndpoint {
    pub fn new(address: impl Into<String>, password: Option<String>) -> Self {
        Self {
            address: address.into(),
            credentials: Credentials { password },
        }
    }
}

/// One telemetry snapshot read from a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Hash rate in TH/s.
    pub hashrate_ths: f64,
    /// Power draw in watts.
    pub wattage: u32,
    /// Configured power limit in watts, if reported.
    pub wattage_limit: Option<u32>,
    /// Joules per terahash.
    pub efficiency: Option<f64>,
    /// Mean chip temperature (°C).
    pub temperature_avg: Option<f64>,
    /// Ambient temperature (°C).
    pub env_temp: Option<f64>,
    pub is_mining: bool,
    pub upfreq_complete: Option<bool>,
    pub hash_stable: Option<bool>,
    /// Per-command failures that did not abort the fetch.
    #[serde(default)]
    pub command_errors: BTreeMap<String, String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Telemetry {
    /// Vendor specific: "upfreq complete" wins when reported, then
    /// "hash stable", otherwise a mining device counts as stable.
    pub fn is_stable(&self) -> bool {
        self.upfreq_complete
            .or(self.hash_stable)
            .unwrap_or(self.is_mining)
    }
}

/// Trait for device access implementations.
#[async_trait::async_trait]
pub trait MinerDriver: Send + Sync {
    async fn fetch_telemetry(&self, endpoint: &DeviceEndpoint) -> Result<Telemetry, DriverError>;

    /// Error messages currently reported by the device.
    async fn fetch_errors(&self, endpoint: &DeviceEndpoint) -> Result<Vec<String>, DriverError>;

    async fn set_hashing(&self, endpoint: &DeviceEndpoint, enabled: bool) -> Result<(), DriverError>;

    async fn set_power_limit(&self, endpoint: &DeviceEndpoint, watts: u32) -> Result<(), DriverError>;

    /// The device's unprocessed telemetry document.
    async fn raw(&self, endpoint: &DeviceEndpoint) -> Result<serde_json::Value, DriverError> {
        Ok(self.fetch_telemetry(endpoint).await?.raw)
    }

    /// Human-readable name for this driver (e.g., "http").
    fn driver_name(&self) -> &str;
}
