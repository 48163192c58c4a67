//! PostgreSQL persistence for devices, schedules, overrides and samples.

pub mod pg;
mod rows;

pub use pg::PgStore;
