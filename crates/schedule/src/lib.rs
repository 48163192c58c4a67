//! Time-and-temperature hashing schedules.
//!
//! This crate provides:
//! - Daily time windows, yearly date ranges and weekday filters
//! - [`Interval`] evaluation against a moment and an optional temperature
//! - [`Schedule`] with an explicit, deterministic interval ordering
//! - Resolution of the interval that applies right now, with overrides first

pub mod error;
pub mod interval;
pub mod limit;
pub mod overrides;
pub mod resolver;
pub mod scenario;
pub mod schedule;
pub mod window;

pub use error::ScheduleError;
pub use interval::Interval;
pub use limit::{BudgetPeriod, PerformanceLimit};
pub use overrides::{Override, OverrideRequest};
pub use resolver::{resolve, resolve_scheduled, Resolution};
pub use scenario::Scenario;
pub use schedule::{interval_order, parse_timezone, Schedule};
pub use window::{MonthDay, TimeOfDay, Weekdays};
