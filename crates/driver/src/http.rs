//! HTTP/JSON miner driver.
//!
//! Talks to the device's management API:
//! - `GET /api/summary` hash rate, power and temperatures (required)
//! - `GET /api/stats` ramp-up and stability flags (optional)
//! - `GET /api/errors` current error messages
//! - `POST /api/mining` `{"enabled": bool}`
//! - `POST /api/power-limit` `{"watts": u32}`

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hashctl_core::config::DriverConfig;
use serde::Deserialize;

use crate::traits::{DeviceEndpoint, DriverError, MinerDriver, Telemetry};

#[derive(Debug, Deserialize)]
struct SummaryDoc {
    #[serde(default)]
    hashrate_ths: f64,
    #[serde(default)]
    wattage: u32,
    #[serde(default)]
    wattage_limit: Option<u32>,
    #[serde(default)]
    efficiency: Option<f64>,
    #[serde(default)]
    temperature_avg: Option<f64>,
    #[serde(default)]
    env_temp: Option<f64>,
    #[serde(default)]
    is_mining: bool,
    /// Set by the device when it is in a fault state.
    #[serde(default)]
    fault: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsDoc {
    #[serde(default)]
    upfreq_complete: Option<bool>,
    #[serde(default)]
    hash_stable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorsDoc {
    #[serde(default)]
    errors: Vec<String>,
}

/// Reaches devices over HTTP with basic auth.
#[derive(Debug, Clone)]
pub struct HttpMinerDriver {
    client: reqwest::Client,
    /// Port used when a device address does not carry one.
    port: u16,
    username: String,
    scheme: &'static str,
}

impl HttpMinerDriver {
    pub fn new(config: &DriverConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            port: config.port,
            username: config.username.clone(),
            scheme: if config.use_tls { "https" } else { "http" },
        })
    }

    fn url(&self, endpoint: &DeviceEndpoint, path: &str) -> String {
        format!("{}://{}{}", self.scheme, authority(&endpoint.address, self.port), path)
    }

    async fn get_json(&self, endpoint: &DeviceEndpoint, path: &str) -> Result<serde_json::Value, DriverError> {
        let response = self
            .client
            .get(self.url(endpoint, path))
            .basic_auth(&self.username, endpoint.credentials.password.as_ref())
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DriverError::Command {
                command: path.to_string(),
                message: format!("{status}: {body}"),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DriverError::Decode(format!("{path}: {e}")))
    }

    async fn post_json(
        &self,
        endpoint: &DeviceEndpoint,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), DriverError> {
        let response = self
            .client
            .post(self.url(endpoint, path))
            .basic_auth(&self.username, endpoint.credentials.password.as_ref())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                address = %endpoint.address,
                command = path,
                %status,
                body = %text,
                "device rejected command"
            );
            return Err(DriverError::Command {
                command: path.to_string(),
                message: format!("{status}: {text}"),
            });
        }
        Ok(())
    }
}

fn transport_error(endpoint: &DeviceEndpoint, e: reqwest::Error) -> DriverError {
    if e.is_decode() {
        DriverError::Decode(e.to_string())
    } else {
        DriverError::Unreachable(format!("{}: {e}", endpoint.address))
    }
}

#[async_trait::async_trait]
impl MinerDriver for HttpMinerDriver {
    async fn fetch_telemetry(&self, endpoint: &DeviceEndpoint) -> Result<Telemetry, DriverError> {
        let summary_raw = match self.get_json(endpoint, "/api/summary").await {
            Ok(v) => v,
            // A device that cannot produce its summary is faulted, not gone.
            Err(DriverError::Command { message, .. }) => return Err(DriverError::Fault(message)),
            Err(e) => return Err(e),
        };
        let summary: SummaryDoc = serde_json::from_value(summary_raw.clone())
            .map_err(|e| DriverError::Decode(format!("/api/summary: {e}")))?;
        if let Some(fault) = summary.fault {
            return Err(DriverError::Fault(fault));
        }

        let mut command_errors = std::collections::BTreeMap::new();
        let (stats, stats_raw) = match self.get_json(endpoint, "/api/stats").await {
            Ok(v) => match serde_json::from_value::<StatsDoc>(v.clone()) {
                Ok(stats) => (stats, v),
                Err(e) => {
                    command_errors.insert("stats".to_string(), e.to_string());
                    (StatsDoc::default(), serde_json::Value::Null)
                }
            },
            Err(e) if e.is_unreachable() => return Err(e),
            Err(e) => {
                command_errors.insert("stats".to_string(), e.to_string());
                (StatsDoc::default(), serde_json::Value::Null)
            }
        };

        let efficiency = summary.efficiency.or_else(|| {
            (summary.hashrate_ths > 0.0).then(|| f64::from(summary.wattage) / summary.hashrate_ths)
        });

        Ok(Telemetry {
            hashrate_ths: summary.hashrate_ths,
            wattage: summary.wattage,
            wattage_limit: summary.wattage_limit,
            efficiency,
            temperature_avg: summary.temperature_avg,
            env_temp: summary.env_temp,
            is_mining: summary.is_mining,
            upfreq_complete: stats.upfreq_complete,
            hash_stable: stats.hash_stable,
            command_errors,
            raw: serde_json::json!({ "summary": summary_raw, "stats": stats_raw }),
        })
    }

    async fn fetch_errors(&self, endpoint: &DeviceEndpoint) -> Result<Vec<String>, DriverError> {
        let doc = self.get_json(endpoint, "/api/errors").await?;
        let errors: ErrorsDoc =
            serde_json::from_value(doc).map_err(|e| DriverError::Decode(format!("/api/errors: {e}")))?;
        Ok(errors.errors)
    }

    async fn set_hashing(&self, endpoint: &DeviceEndpoint, enabled: bool) -> Result<(), DriverError> {
        tracing::info!(address = %endpoint.address, enabled, "setting hashing");
        self.post_json(endpoint, "/api/mining", serde_json::json!({ "enabled": enabled }))
            .await
    }

    async fn set_power_limit(&self, endpoint: &DeviceEndpoint, watts: u32) -> Result<(), DriverError> {
        tracing::info!(address = %endpoint.address, watts, "setting power limit");
        self.post_json(endpoint, "/api/power-limit", serde_json::json!({ "watts": watts }))
            .await
    }

    fn driver_name(&self) -> &str {
        "http"
    }
}

/// `host:port` for a device address. Bare IPv6 addresses are bracketed and
/// the default port is added wherever the address does not name one.
fn authority(address: &str, default_port: u16) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => return format!("[{ip}]:{default_port}"),
        Ok(IpAddr::V4(ip)) => return format!("{ip}:{default_port}"),
        Err(_) => {}
    }
    if address.starts_with('[') && address.ends_with(']') {
        return format!("{address}:{default_port}");
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => address.to_string(),
        _ => format!("{address}:{default_port}"),
    }
}
