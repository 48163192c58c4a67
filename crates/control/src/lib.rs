//! Control loop for a fleet of mining devices.
//!
//! This crate provides:
//! - Device model, status classification and performance samples with cost math
//! - Control decisions with a debounce gate and energy budgets
//! - `Controller` running enforcement, sampling, manual control and summaries
//! - `RecordStore` persistence seam with an in-memory implementation
//! - Periodic runner for the sampling and enforcement cycles

pub mod budget;
pub mod controller;
pub mod decision;
pub mod device;
pub mod error;
pub mod runner;
pub mod sample;
pub mod status;
pub mod store;

pub use controller::{Controller, CycleReport, DeviceOutcome, DeviceSummary, IntervalSummary, SampleSummary};
pub use decision::{ControlAction, Debounce};
pub use device::{Device, DeviceState, Observation, Profile};
pub use error::ControlError;
pub use runner::{run_periodic, CycleTask};
pub use sample::PerformanceSample;
pub use status::DeviceStatus;
pub use store::{MemoryStore, OverrideChange, RecordStore, StoreError, UnitOfWork, WorkParts};
