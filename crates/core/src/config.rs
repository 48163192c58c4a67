use std::env;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub driver: DriverConfig,
    pub control: ControlConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `HASHCTL_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("HASHCTL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            driver: DriverConfig::from_env_profiled(p),
            control: ControlConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings the control loops cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let non_zero = [
            ("SAMPLE_PERIOD_SECS", self.control.sample_period_secs),
            ("ENFORCE_PERIOD_SECS", self.control.enforce_period_secs),
            ("DEVICE_TIMEOUT_SECS", self.control.device_timeout_secs),
            ("MINER_API_TIMEOUT_SECS", self.driver.timeout_secs),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(CoreError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if self.control.override_min_hours == 0 || self.control.override_min_hours > 24 {
            return Err(CoreError::InvalidValue {
                key: "OVERRIDE_MIN_HOURS".to_string(),
                value: self.control.override_min_hours.to_string(),
            });
        }

        if self.driver.timeout_secs > self.control.device_timeout_secs {
            return Err(CoreError::Config(format!(
                "MINER_API_TIMEOUT_SECS ({}) must not exceed DEVICE_TIMEOUT_SECS ({})",
                self.driver.timeout_secs, self.control.device_timeout_secs
            )));
        }

        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:    host={}, db={}, configured={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.is_configured()
        );
        tracing::info!(
            "  driver:      port={}, user={}, timeout={}s, tls={}",
            self.driver.port,
            self.driver.username,
            self.driver.timeout_secs,
            self.driver.use_tls
        );
        tracing::info!(
            "  control:     sample={}s, enforce={}s, debounce={}m, device_timeout={}s",
            self.control.sample_period_secs,
            self.control.enforce_period_secs,
            self.control.debounce_minutes,
            self.control.device_timeout_secs
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 5000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "hashctl"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 5),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Miner driver ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// TCP port of the miner's HTTP API.
    pub port: u16,
    /// Username paired with each device's password.
    pub username: String,
    pub timeout_secs: u64,
    pub use_tls: bool,
}

impl DriverConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            port: profiled_env_u16(p, "MINER_API_PORT", 80),
            username: profiled_env_or(p, "MINER_API_USERNAME", "root"),
            timeout_secs: profiled_env_u64(p, "MINER_API_TIMEOUT_SECS", 10),
            use_tls: profiled_env_or(p, "MINER_API_TLS", "false") == "true",
        }
    }
}

// ── Control loops ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Status refresh and sampling period.
    pub sample_period_secs: u64,
    /// Schedule enforcement period.
    pub enforce_period_secs: u64,
    /// Minimum time between hashing state changes of a stable device.
    pub debounce_minutes: u64,
    /// Upper bound for one device's pass within a cycle.
    pub device_timeout_secs: u64,
    /// Lower bound for overrides whose duration is derived from the schedule.
    pub override_min_hours: u32,
}

impl ControlConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            sample_period_secs: profiled_env_u64(p, "SAMPLE_PERIOD_SECS", 60),
            enforce_period_secs: profiled_env_u64(p, "ENFORCE_PERIOD_SECS", 600),
            debounce_minutes: profiled_env_u64(p, "DEBOUNCE_MINUTES", 30),
            device_timeout_secs: profiled_env_u64(p, "DEVICE_TIMEOUT_SECS", 30),
            override_min_hours: profiled_env_u32(p, "OVERRIDE_MIN_HOURS", 2),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            sample_period_secs: 60,
            enforce_period_secs: 600,
            debounce_minutes: 30,
            device_timeout_secs: 30,
            override_min_hours: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            profile: String::new(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                cors_origin: "*".to_string(),
            },
            postgres: PostgresConfig {
                host: "db".to_string(),
                port: 5432,
                database: "hashctl".to_string(),
                username: Some("postgres".to_string()),
                password: Some("secret".to_string()),
                ssl_mode: "disable".to_string(),
                max_connections: 5,
            },
            driver: DriverConfig {
                port: 80,
                username: "root".to_string(),
                timeout_secs: 10,
                use_tls: false,
            },
            control: ControlConfig::default(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut cfg = config();
        cfg.control.sample_period_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("SAMPLE_PERIOD_SECS"));
    }

    #[test]
    fn driver_timeout_must_fit_device_timeout() {
        let mut cfg = config();
        cfg.driver.timeout_secs = 60;
        assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn override_min_hours_bounds() {
        let mut cfg = config();
        cfg.control.override_min_hours = 25;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn connection_string_includes_credentials() {
        assert_eq!(
            config().postgres.connection_string(),
            "postgres://postgres:secret@db:5432/hashctl?sslmode=disable"
        );
    }

    #[test]
    fn profile_label_defaults() {
        assert_eq!(config().profile_label(), "default");
    }
}
