//! Network access to mining devices.
//!
//! This crate provides:
//! - `MinerDriver` trait for reading telemetry and issuing hashing/power commands
//! - HTTP/JSON driver implementation
//! - Scripted in-memory driver for tests (`test-utils` feature)

pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;
pub mod traits;

pub use http::HttpMinerDriver;
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedDriver;
pub use traits::{Credentials, DeviceEndpoint, DriverError, MinerDriver, Telemetry};
